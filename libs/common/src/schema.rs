//! Schema initialization for the user service database
//!
//! All statements run inside one transaction: either every table, index and
//! trigger exists afterwards or nothing was changed.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::{error, info};

/// Tables carrying an `updated_at` column maintained by trigger.
const TIMESTAMPED_TABLES: [&str; 4] = [
    "users",
    "user_profiles",
    "user_preferences",
    "mental_health_profiles",
];

const TABLES: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        auth_user_id INTEGER UNIQUE NOT NULL,
        email VARCHAR(255) UNIQUE NOT NULL,
        role VARCHAR(20) NOT NULL DEFAULT 'user'
            CHECK (role IN ('user', 'psychiatrist', 'admin')),
        is_active BOOLEAN NOT NULL DEFAULT true,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        first_name VARCHAR(100),
        last_name VARCHAR(100),
        date_of_birth DATE,
        gender VARCHAR(20),
        phone VARCHAR(20),
        address_line_1 VARCHAR(255),
        address_line_2 VARCHAR(255),
        city VARCHAR(100),
        state VARCHAR(100),
        postal_code VARCHAR(20),
        country VARCHAR(100) DEFAULT 'United States',
        bio TEXT,
        emergency_contact_name VARCHAR(100),
        emergency_contact_phone VARCHAR(20),
        emergency_contact_relationship VARCHAR(50),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_preferences (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        theme VARCHAR(20) NOT NULL DEFAULT 'light',
        language VARCHAR(10) NOT NULL DEFAULT 'en',
        timezone VARCHAR(50) NOT NULL DEFAULT 'UTC',
        email_notifications BOOLEAN NOT NULL DEFAULT true,
        push_notifications BOOLEAN NOT NULL DEFAULT true,
        sms_notifications BOOLEAN NOT NULL DEFAULT false,
        appointment_reminders BOOLEAN NOT NULL DEFAULT true,
        wellness_tips BOOLEAN NOT NULL DEFAULT true,
        marketing_emails BOOLEAN NOT NULL DEFAULT false,
        data_sharing BOOLEAN NOT NULL DEFAULT false,
        session_recording BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mental_health_profiles (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        primary_concerns TEXT[] NOT NULL DEFAULT '{}',
        therapy_goals TEXT[] NOT NULL DEFAULT '{}',
        previous_therapy BOOLEAN NOT NULL DEFAULT false,
        current_medications TEXT[] NOT NULL DEFAULT '{}',
        allergies TEXT[] NOT NULL DEFAULT '{}',
        medical_conditions TEXT[] NOT NULL DEFAULT '{}',
        therapy_preferences JSONB,
        crisis_plan TEXT,
        support_system TEXT,
        stress_level INTEGER CHECK (stress_level >= 1 AND stress_level <= 10),
        sleep_quality INTEGER CHECK (sleep_quality >= 1 AND sleep_quality <= 10),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_activities (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        activity_type VARCHAR(50) NOT NULL,
        activity_description TEXT,
        metadata JSONB,
        ip_address INET,
        user_agent TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

const INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
    "CREATE INDEX IF NOT EXISTS idx_users_is_active ON users(is_active)",
    "CREATE INDEX IF NOT EXISTS idx_user_activities_user_id ON user_activities(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_user_activities_created_at ON user_activities(created_at)",
];

const UPDATED_AT_FUNCTION: &str = r#"
    CREATE OR REPLACE FUNCTION update_updated_at_column()
    RETURNS TRIGGER AS $$
    BEGIN
        NEW.updated_at = NOW();
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql
"#;

/// Create all tables, indexes and triggers the user service relies on.
///
/// Safe to run on every startup. Any failing statement rolls back the
/// whole initialization.
pub async fn initialize_schema(pool: &PgPool) -> DatabaseResult<()> {
    let mut tx = pool.begin().await.map_err(DatabaseError::Connection)?;

    let mut statements: Vec<String> = TABLES.iter().map(|s| s.to_string()).collect();
    statements.extend(INDEXES.iter().map(|s| s.to_string()));
    statements.push(UPDATED_AT_FUNCTION.to_string());
    for table in TIMESTAMPED_TABLES {
        statements.push(format!(
            "DROP TRIGGER IF EXISTS update_{table}_updated_at ON {table}"
        ));
        statements.push(format!(
            "CREATE TRIGGER update_{table}_updated_at BEFORE UPDATE ON {table} \
             FOR EACH ROW EXECUTE FUNCTION update_updated_at_column()"
        ));
    }

    for statement in &statements {
        if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
            error!("Database initialization failed: {}", e);
            if let Err(rollback) = tx.rollback().await {
                error!("Rollback after failed initialization also failed: {}", rollback);
            }
            return Err(DatabaseError::Schema(e));
        }
    }

    tx.commit().await.map_err(DatabaseError::Schema)?;
    info!("Database tables created successfully");
    Ok(())
}
