//! Activity log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;

/// Kind of side-effecting action recorded in the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    UserCreated,
    UserUpdated,
    UserDeleted,
    DataExport,
    ProfileUpdate,
    PreferencesUpdate,
    NotificationPreferencesUpdate,
    PrivacyPreferencesUpdate,
    PreferencesReset,
    MentalHealthProfileUpdate,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::UserCreated => "user_created",
            ActivityType::UserUpdated => "user_updated",
            ActivityType::UserDeleted => "user_deleted",
            ActivityType::DataExport => "data_export",
            ActivityType::ProfileUpdate => "profile_update",
            ActivityType::PreferencesUpdate => "preferences_update",
            ActivityType::NotificationPreferencesUpdate => "notification_preferences_update",
            ActivityType::PrivacyPreferencesUpdate => "privacy_preferences_update",
            ActivityType::PreferencesReset => "preferences_reset",
            ActivityType::MentalHealthProfileUpdate => "mental_health_profile_update",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored activity row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserActivity {
    pub id: i32,
    pub user_id: i32,
    pub activity_type: String,
    pub activity_description: Option<String>,
    pub metadata: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Activity to append
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: i32,
    pub activity_type: ActivityType,
    pub description: String,
    pub metadata: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewActivity {
    pub fn new(user_id: i32, activity_type: ActivityType, description: impl Into<String>) -> Self {
        Self {
            user_id,
            activity_type,
            description: description.into(),
            metadata: Value::Object(Default::default()),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Per-type activity count over a time window
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivitySummary {
    pub activity_type: String,
    pub count: i64,
    pub last_activity: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_type_names_match_serde() {
        for kind in [
            ActivityType::UserCreated,
            ActivityType::NotificationPreferencesUpdate,
            ActivityType::MentalHealthProfileUpdate,
        ] {
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                json!(kind.as_str())
            );
        }
    }

    #[test]
    fn new_activity_defaults_to_empty_metadata() {
        let activity = NewActivity::new(7, ActivityType::DataExport, "User data exported")
            .client(Some("127.0.0.1".to_string()), None);

        assert_eq!(activity.metadata, json!({}));
        assert_eq!(activity.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(activity.user_agent.is_none());
    }
}
