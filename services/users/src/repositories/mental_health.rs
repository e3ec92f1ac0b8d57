//! Mental-health profile repository

use sqlx::PgPool;
use tracing::info;

use super::{ColumnValue, upsert_columns};
use crate::models::{MentalHealthPatch, MentalHealthProfile};

const TABLE: &str = "mental_health_profiles";

/// Mental-health profile repository
#[derive(Clone)]
pub struct MentalHealthRepository {
    pool: PgPool,
}

impl MentalHealthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user_id(
        &self,
        user_id: i32,
    ) -> sqlx::Result<Option<MentalHealthProfile>> {
        sqlx::query_as::<_, MentalHealthProfile>(
            "SELECT * FROM mental_health_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn upsert(
        &self,
        user_id: i32,
        patch: &MentalHealthPatch,
    ) -> sqlx::Result<MentalHealthProfile> {
        info!(
            "Upserting mental-health profile of user {}: {:?}",
            user_id,
            patch.field_names()
        );
        let columns = mental_health_columns(patch).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        upsert_columns(&self.pool, TABLE, user_id, columns).await
    }
}

fn mental_health_columns(
    patch: &MentalHealthPatch,
) -> Result<Vec<(&'static str, ColumnValue)>, serde_json::Error> {
    let mut columns: Vec<(&'static str, ColumnValue)> = patch
        .list_fields()
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|items| (name, ColumnValue::TextList(items.clone())))
        })
        .collect();

    if let Some(previous_therapy) = patch.previous_therapy {
        columns.push(("previous_therapy", ColumnValue::Flag(previous_therapy)));
    }
    if let Some(prefs) = &patch.therapy_preferences {
        let value = prefs.as_ref().map(serde_json::to_value).transpose()?;
        columns.push(("therapy_preferences", ColumnValue::Json(value)));
    }
    if let Some(crisis_plan) = &patch.crisis_plan {
        columns.push(("crisis_plan", ColumnValue::Text(crisis_plan.clone())));
    }
    if let Some(support_system) = &patch.support_system {
        columns.push(("support_system", ColumnValue::Text(support_system.clone())));
    }
    if let Some(stress_level) = patch.stress_level {
        columns.push(("stress_level", ColumnValue::Int(stress_level)));
    }
    if let Some(sleep_quality) = patch.sleep_quality {
        columns.push(("sleep_quality", ColumnValue::Int(sleep_quality)));
    }

    Ok(columns)
}
