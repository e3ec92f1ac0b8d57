//! Preferences repository for database operations

use sqlx::PgPool;
use tracing::info;

use super::{ColumnValue, ensure_row, upsert_columns};
use crate::models::{PreferencesPatch, UserPreferences};

const TABLE: &str = "user_preferences";

/// Preferences repository
#[derive(Clone)]
pub struct PreferencesRepository {
    pool: PgPool,
}

impl PreferencesRepository {
    /// Create a new preferences repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user_id(&self, user_id: i32) -> sqlx::Result<Option<UserPreferences>> {
        sqlx::query_as::<_, UserPreferences>("SELECT * FROM user_preferences WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Preferences of a user, created with defaults when missing
    pub async fn find_or_create(&self, user_id: i32) -> sqlx::Result<UserPreferences> {
        ensure_row(&self.pool, TABLE, user_id).await
    }

    /// Create the row on first write, update the present fields after
    pub async fn upsert(
        &self,
        user_id: i32,
        patch: &PreferencesPatch,
    ) -> sqlx::Result<UserPreferences> {
        info!(
            "Upserting preferences of user {}: {:?}",
            user_id,
            patch.field_names()
        );
        upsert_columns(&self.pool, TABLE, user_id, preference_columns(patch)).await
    }

    /// Write every column back to its default
    pub async fn reset(&self, user_id: i32) -> sqlx::Result<UserPreferences> {
        info!("Resetting preferences of user {}", user_id);
        self.upsert(user_id, &PreferencesPatch::defaults()).await
    }
}

fn preference_columns(patch: &PreferencesPatch) -> Vec<(&'static str, ColumnValue)> {
    let text = patch.text_fields().into_iter().filter_map(|(name, value)| {
        value
            .as_ref()
            .map(|value| (name, ColumnValue::Text(Some(value.clone()))))
    });
    let flags = patch
        .flag_fields()
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, ColumnValue::Flag(value))));

    text.chain(flags).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, NotificationPatch, Role};
    use crate::repositories::UserRepository;

    #[test]
    fn only_present_fields_become_columns() {
        let patch = PreferencesPatch {
            theme: Some("dark".to_string()),
            wellness_tips: Some(false),
            ..Default::default()
        };

        assert_eq!(
            preference_columns(&patch),
            vec![
                ("theme", ColumnValue::Text(Some("dark".to_string()))),
                ("wellness_tips", ColumnValue::Flag(false)),
            ]
        );
    }

    #[test]
    fn reset_writes_every_column() {
        assert_eq!(preference_columns(&PreferencesPatch::defaults()).len(), 11);
    }

    #[test]
    fn notification_write_stays_within_its_columns() {
        let patch: NotificationPatch =
            serde_json::from_str(r#"{"push_notifications": false, "data_sharing": true}"#).unwrap();

        assert_eq!(
            preference_columns(&patch.into()),
            vec![("push_notifications", ColumnValue::Flag(false))]
        );
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn upsert_is_idempotent_and_merges_fields() {
        use common::database::{DatabaseConfig, init_pool};

        let pool = init_pool(&DatabaseConfig::from_env().unwrap()).await.unwrap();
        common::schema::initialize_schema(&pool).await.unwrap();

        let auth_user_id = 2_000_000 + chrono::Utc::now().timestamp_subsec_micros() as i32;
        let user = UserRepository::new(pool.clone())
            .create(&NewUser {
                auth_user_id,
                email: format!("prefs-{}@example.com", auth_user_id),
                role: Role::User,
            })
            .await
            .unwrap();
        let repository = PreferencesRepository::new(pool);

        let dark = PreferencesPatch {
            theme: Some("dark".to_string()),
            push_notifications: Some(false),
            ..Default::default()
        };
        let first = repository.upsert(user.id, &dark).await.unwrap();
        let second = repository.upsert(user.id, &dark).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.theme, "dark");
        assert!(!second.push_notifications);

        let merged = repository
            .upsert(
                user.id,
                &PreferencesPatch {
                    theme: Some("system".to_string()),
                    wellness_tips: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.theme, "system");
        assert!(!merged.push_notifications);
        assert!(!merged.wellness_tips);
        assert_eq!(merged.language, "en");
        assert_eq!(merged.timezone, "UTC");
        assert!(merged.email_notifications);
        assert!(!merged.sms_notifications);
        assert!(merged.appointment_reminders);
        assert!(!merged.marketing_emails);
        assert!(!merged.data_sharing);
        assert!(!merged.session_recording);

        let stored = repository.find_by_user_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.theme, "system");
        assert!(!stored.push_notifications);
    }
}
