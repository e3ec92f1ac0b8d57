//! Profile repository for database operations

use sqlx::PgPool;
use tracing::info;

use super::{ColumnValue, upsert_columns};
use crate::models::{ProfilePatch, UserProfile};

const TABLE: &str = "user_profiles";

/// Profile repository
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the profile of a user, if one was ever written
    pub async fn find_by_user_id(&self, user_id: i32) -> sqlx::Result<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Create the profile on first write, update the present fields after
    pub async fn upsert(&self, user_id: i32, patch: &ProfilePatch) -> sqlx::Result<UserProfile> {
        info!("Upserting profile of user {}: {:?}", user_id, patch.field_names());
        upsert_columns(&self.pool, TABLE, user_id, profile_columns(patch)).await
    }
}

fn profile_columns(patch: &ProfilePatch) -> Vec<(&'static str, ColumnValue)> {
    let mut columns: Vec<(&'static str, ColumnValue)> = patch
        .text_fields()
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|value| (name, ColumnValue::Text(value.clone())))
        })
        .collect();

    if let Some(date_of_birth) = patch.date_of_birth {
        columns.push(("date_of_birth", ColumnValue::Date(date_of_birth)));
    }

    columns
}
