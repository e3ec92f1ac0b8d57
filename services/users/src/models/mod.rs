//! User service models

pub mod activity;
pub mod mental_health;
pub mod preferences;
pub mod profile;
pub mod user;

// Re-export for convenience
pub use activity::{ActivitySummary, ActivityType, NewActivity, UserActivity};
pub use mental_health::{MentalHealthPatch, MentalHealthProfile};
pub use preferences::{
    NotificationPatch, NotificationPreferences, PreferencesPatch, PrivacyPatch,
    PrivacyPreferences, UserPreferences,
};
pub use profile::{ProfilePatch, UserProfile};
pub use user::{NewUser, Role, User, UserFilter, UserListItem, UserSummary, UserUpdate};

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Use together with `#[serde(default)]`: an absent key stays `None`, a
/// `null` becomes `Some(None)` and a value becomes `Some(Some(value))`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct BioPatch {
        #[serde(default, deserialize_with = "nullable")]
        bio: Option<Option<String>>,
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let absent: BioPatch = serde_json::from_str("{}").unwrap();
        let null: BioPatch = serde_json::from_str(r#"{"bio": null}"#).unwrap();
        let value: BioPatch = serde_json::from_str(r#"{"bio": "hi"}"#).unwrap();

        assert_eq!(absent.bio, None);
        assert_eq!(null.bio, Some(None));
        assert_eq!(value.bio, Some(Some("hi".to_string())));
    }
}
