//! User preferences model and its notification/privacy sub-views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_THEME: &str = "light";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// User preferences entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserPreferences {
    pub id: i32,
    pub user_id: i32,
    pub theme: String,
    pub language: String,
    pub timezone: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub sms_notifications: bool,
    pub appointment_reminders: bool,
    pub wellness_tips: bool,
    pub marketing_emails: bool,
    pub data_sharing: bool,
    pub session_recording: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Notification-only view of the preferences
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPreferences {
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub sms_notifications: bool,
    pub appointment_reminders: bool,
    pub wellness_tips: bool,
    pub marketing_emails: bool,
}

impl From<&UserPreferences> for NotificationPreferences {
    fn from(p: &UserPreferences) -> Self {
        Self {
            email_notifications: p.email_notifications,
            push_notifications: p.push_notifications,
            sms_notifications: p.sms_notifications,
            appointment_reminders: p.appointment_reminders,
            wellness_tips: p.wellness_tips,
            marketing_emails: p.marketing_emails,
        }
    }
}

/// Privacy-only view of the preferences
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivacyPreferences {
    pub data_sharing: bool,
    pub session_recording: bool,
}

impl From<&UserPreferences> for PrivacyPreferences {
    fn from(p: &UserPreferences) -> Self {
        Self {
            data_sharing: p.data_sharing,
            session_recording: p.session_recording,
        }
    }
}

/// Partial preferences write; `None` leaves the column untouched.
///
/// Every preference column is non-nullable, so there is no explicit-null case.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreferencesPatch {
    pub theme: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub appointment_reminders: Option<bool>,
    pub wellness_tips: Option<bool>,
    pub marketing_emails: Option<bool>,
    pub data_sharing: Option<bool>,
    pub session_recording: Option<bool>,
}

impl PreferencesPatch {
    /// A patch that writes every column back to its default
    pub fn defaults() -> Self {
        Self {
            theme: Some(DEFAULT_THEME.to_string()),
            language: Some(DEFAULT_LANGUAGE.to_string()),
            timezone: Some(DEFAULT_TIMEZONE.to_string()),
            email_notifications: Some(true),
            push_notifications: Some(true),
            sms_notifications: Some(false),
            appointment_reminders: Some(true),
            wellness_tips: Some(true),
            marketing_emails: Some(false),
            data_sharing: Some(false),
            session_recording: Some(false),
        }
    }

    /// Text fields paired with their column names
    pub fn text_fields(&self) -> [(&'static str, &Option<String>); 3] {
        [
            ("theme", &self.theme),
            ("language", &self.language),
            ("timezone", &self.timezone),
        ]
    }

    /// Flag fields paired with their column names
    pub fn flag_fields(&self) -> [(&'static str, Option<bool>); 8] {
        [
            ("email_notifications", self.email_notifications),
            ("push_notifications", self.push_notifications),
            ("sms_notifications", self.sms_notifications),
            ("appointment_reminders", self.appointment_reminders),
            ("wellness_tips", self.wellness_tips),
            ("marketing_emails", self.marketing_emails),
            ("data_sharing", self.data_sharing),
            ("session_recording", self.session_recording),
        ]
    }

    /// Names of the fields present in the patch
    pub fn field_names(&self) -> Vec<&'static str> {
        let text = self
            .text_fields()
            .into_iter()
            .filter(|(_, value)| value.is_some())
            .map(|(name, _)| name);
        let flags = self
            .flag_fields()
            .into_iter()
            .filter(|(_, value)| value.is_some())
            .map(|(name, _)| name);
        text.chain(flags).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

/// Notification sub-view write. Keys outside this set are dropped on
/// deserialization, never rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationPatch {
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub appointment_reminders: Option<bool>,
    pub wellness_tips: Option<bool>,
    pub marketing_emails: Option<bool>,
}

impl From<NotificationPatch> for PreferencesPatch {
    fn from(n: NotificationPatch) -> Self {
        Self {
            email_notifications: n.email_notifications,
            push_notifications: n.push_notifications,
            sms_notifications: n.sms_notifications,
            appointment_reminders: n.appointment_reminders,
            wellness_tips: n.wellness_tips,
            marketing_emails: n.marketing_emails,
            ..Default::default()
        }
    }
}

/// Privacy sub-view write, allow-listed like [`NotificationPatch`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrivacyPatch {
    pub data_sharing: Option<bool>,
    pub session_recording: Option<bool>,
}

impl From<PrivacyPatch> for PreferencesPatch {
    fn from(p: PrivacyPatch) -> Self {
        Self {
            data_sharing: p.data_sharing,
            session_recording: p.session_recording,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_column() {
        let defaults = PreferencesPatch::defaults();
        assert_eq!(defaults.field_names().len(), 11);
        assert_eq!(defaults.theme.as_deref(), Some("light"));
        assert_eq!(defaults.sms_notifications, Some(false));
    }

    #[test]
    fn notification_patch_ignores_fields_outside_its_allow_list() {
        let patch: NotificationPatch = serde_json::from_str(
            r#"{"sms_notifications": true, "theme": "dark", "data_sharing": true}"#,
        )
        .unwrap();

        let patch = PreferencesPatch::from(patch);
        assert_eq!(patch.field_names(), vec!["sms_notifications"]);
        assert_eq!(patch.theme, None);
        assert_eq!(patch.data_sharing, None);
    }

    #[test]
    fn privacy_patch_ignores_fields_outside_its_allow_list() {
        let patch: PrivacyPatch = serde_json::from_str(
            r#"{"session_recording": true, "email_notifications": false, "language": "fr"}"#,
        )
        .unwrap();

        let patch = PreferencesPatch::from(patch);
        assert_eq!(patch.field_names(), vec!["session_recording"]);
    }

    #[test]
    fn empty_sub_view_patch_is_empty() {
        let patch: PrivacyPatch = serde_json::from_str(r#"{"theme": "dark"}"#).unwrap();
        assert!(PreferencesPatch::from(patch).is_empty());
    }
}
