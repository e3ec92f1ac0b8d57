//! Common library for the MindNest user services
//!
//! This crate provides the infrastructure shared by the services: the
//! PostgreSQL connection pool and its lifecycle, the one-time schema
//! initialization, and the infrastructure error type.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, close_pool, health_check, init_pool};
//! use common::schema::initialize_schema;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     initialize_schema(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     close_pool(pool).await;
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod schema;
