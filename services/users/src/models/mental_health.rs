//! Mental-health profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use super::nullable;

/// Structured therapy preferences stored as JSONB
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TherapyPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub therapist_gender_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_considerations: Option<String>,
}

/// Mental-health profile entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MentalHealthProfile {
    pub id: i32,
    pub user_id: i32,
    pub primary_concerns: Vec<String>,
    pub therapy_goals: Vec<String>,
    pub previous_therapy: bool,
    pub current_medications: Vec<String>,
    pub allergies: Vec<String>,
    pub medical_conditions: Vec<String>,
    pub therapy_preferences: Option<Value>,
    pub crisis_plan: Option<String>,
    pub support_system: Option<String>,
    pub stress_level: Option<i32>,
    pub sleep_quality: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial mental-health write.
///
/// List columns are non-nullable, so `null` and absence both leave them
/// untouched. Nullable columns use the double-`Option` encoding of
/// [`super::ProfilePatch`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentalHealthPatch {
    pub primary_concerns: Option<Vec<String>>,
    pub therapy_goals: Option<Vec<String>>,
    pub previous_therapy: Option<bool>,
    pub current_medications: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub medical_conditions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub therapy_preferences: Option<Option<TherapyPreferences>>,
    #[serde(default, deserialize_with = "nullable")]
    pub crisis_plan: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub support_system: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub stress_level: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sleep_quality: Option<Option<i32>>,
}

impl MentalHealthPatch {
    /// List fields paired with their column names
    pub fn list_fields(&self) -> [(&'static str, &Option<Vec<String>>); 5] {
        [
            ("primary_concerns", &self.primary_concerns),
            ("therapy_goals", &self.therapy_goals),
            ("current_medications", &self.current_medications),
            ("allergies", &self.allergies),
            ("medical_conditions", &self.medical_conditions),
        ]
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .list_fields()
            .into_iter()
            .filter(|(_, value)| value.is_some())
            .map(|(name, _)| name)
            .collect();

        let scalars = [
            ("previous_therapy", self.previous_therapy.is_some()),
            ("therapy_preferences", self.therapy_preferences.is_some()),
            ("crisis_plan", self.crisis_plan.is_some()),
            ("support_system", self.support_system.is_some()),
            ("stress_level", self.stress_level.is_some()),
            ("sleep_quality", self.sleep_quality.is_some()),
        ];
        names.extend(
            scalars
                .into_iter()
                .filter(|(_, present)| *present)
                .map(|(name, _)| name),
        );
        names
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_tracks_present_and_cleared_fields() {
        let patch: MentalHealthPatch = serde_json::from_str(
            r#"{
                "primary_concerns": ["anxiety"],
                "stress_level": 4,
                "crisis_plan": null
            }"#,
        )
        .unwrap();

        assert_eq!(
            patch.field_names(),
            vec!["primary_concerns", "crisis_plan", "stress_level"]
        );
        assert_eq!(patch.crisis_plan, Some(None));
        assert_eq!(patch.stress_level, Some(Some(4)));
        assert!(MentalHealthPatch::default().is_empty());
    }

    #[test]
    fn therapy_preferences_reject_unknown_keys() {
        let parsed = serde_json::from_str::<TherapyPreferences>(
            r#"{"session_type": "individual", "favourite_colour": "blue"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn therapy_preferences_omit_unset_keys() {
        let prefs = TherapyPreferences {
            session_duration: Some(45),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&prefs).unwrap(),
            serde_json::json!({"session_duration": 45})
        );
    }
}
