//! User profile model, completion scoring and avatar URLs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::nullable;

/// Fields that count towards profile completion
pub const REQUIRED_PROFILE_FIELDS: [&str; 8] = [
    "first_name",
    "last_name",
    "date_of_birth",
    "gender",
    "phone",
    "city",
    "state",
    "country",
];

pub const DEFAULT_AVATAR_SIZE: u32 = 64;
pub const MIN_AVATAR_SIZE: u32 = 16;
pub const MAX_AVATAR_SIZE: u32 = 128;

/// User profile entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: i32,
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl UserProfile {
    fn required_fields(&self) -> [(&'static str, bool); 8] {
        [
            ("first_name", filled(&self.first_name)),
            ("last_name", filled(&self.last_name)),
            ("date_of_birth", self.date_of_birth.is_some()),
            ("gender", filled(&self.gender)),
            ("phone", filled(&self.phone)),
            ("city", filled(&self.city)),
            ("state", filled(&self.state)),
            ("country", filled(&self.country)),
        ]
    }

    /// Required fields that are absent or blank. A missing profile misses all of them.
    pub fn missing_fields(profile: Option<&Self>) -> Vec<&'static str> {
        match profile {
            None => REQUIRED_PROFILE_FIELDS.to_vec(),
            Some(profile) => profile
                .required_fields()
                .into_iter()
                .filter(|(_, present)| !present)
                .map(|(name, _)| name)
                .collect(),
        }
    }

    /// Share of required fields filled in, as a rounded percentage
    pub fn completion_percentage(profile: Option<&Self>) -> u8 {
        let total = REQUIRED_PROFILE_FIELDS.len();
        let completed = total - Self::missing_fields(profile).len();
        ((completed as f64 / total as f64) * 100.0).round() as u8
    }

    /// Avatar for this profile, if it carries any name
    pub fn avatar_url(&self) -> Option<String> {
        (filled(&self.first_name) || filled(&self.last_name)).then(|| {
            avatar_url(
                self.first_name.as_deref(),
                self.last_name.as_deref(),
                DEFAULT_AVATAR_SIZE,
            )
        })
    }
}

/// Build a UI Avatars URL from the user's names.
///
/// Deterministic in its inputs; falls back to the name `User`.
pub fn avatar_url(first_name: Option<&str>, last_name: Option<&str>, size: u32) -> String {
    let name = [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let name = if name.is_empty() {
        "User".to_string()
    } else {
        encode_uri_component(&name)
    };

    format!(
        "https://ui-avatars.com/api/?name={}&size={}&background=3B82F6&color=ffffff",
        name, size
    )
}

/// Clamp a requested avatar size into the range the avatar service accepts
pub fn clamp_avatar_size(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_AVATAR_SIZE)
        .clamp(MIN_AVATAR_SIZE, MAX_AVATAR_SIZE)
}

fn encode_uri_component(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Partial profile write.
///
/// Outer `None`: key absent, column untouched. `Some(None)`: explicit null,
/// column cleared. `Some(Some(v))`: column set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address_line_1: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address_line_2: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub postal_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub country: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub emergency_contact_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub emergency_contact_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub emergency_contact_relationship: Option<Option<String>>,
}

impl ProfilePatch {
    /// Text fields paired with their column names
    pub fn text_fields(&self) -> [(&'static str, &Option<Option<String>>); 14] {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("gender", &self.gender),
            ("phone", &self.phone),
            ("address_line_1", &self.address_line_1),
            ("address_line_2", &self.address_line_2),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
            ("bio", &self.bio),
            ("emergency_contact_name", &self.emergency_contact_name),
            ("emergency_contact_phone", &self.emergency_contact_phone),
            (
                "emergency_contact_relationship",
                &self.emergency_contact_relationship,
            ),
        ]
    }

    /// Mutable access to the text fields, used to normalize input
    pub fn text_fields_mut(&mut self) -> [&mut Option<Option<String>>; 14] {
        [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.gender,
            &mut self.phone,
            &mut self.address_line_1,
            &mut self.address_line_2,
            &mut self.city,
            &mut self.state,
            &mut self.postal_code,
            &mut self.country,
            &mut self.bio,
            &mut self.emergency_contact_name,
            &mut self.emergency_contact_phone,
            &mut self.emergency_contact_relationship,
        ]
    }

    /// Names of the fields present in the patch
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .text_fields()
            .into_iter()
            .filter(|(_, value)| value.is_some())
            .map(|(name, _)| name)
            .collect();
        if self.date_of_birth.is_some() {
            names.push("date_of_birth");
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: 1,
            user_id: 1,
            first_name: None,
            last_name: None,
            date_of_birth: None,
            gender: None,
            phone: None,
            address_line_1: None,
            address_line_2: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            bio: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            emergency_contact_relationship: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_profile_is_zero_percent() {
        assert_eq!(UserProfile::completion_percentage(None), 0);
        assert_eq!(UserProfile::missing_fields(None).len(), 8);
    }

    #[test]
    fn empty_profile_is_zero_and_full_profile_is_hundred() {
        let mut p = profile();
        assert_eq!(UserProfile::completion_percentage(Some(&p)), 0);

        p.first_name = Some("Ada".into());
        p.last_name = Some("Lovelace".into());
        p.date_of_birth = NaiveDate::from_ymd_opt(1990, 12, 10);
        p.gender = Some("female".into());
        p.phone = Some("+44 20 7946 0000".into());
        p.city = Some("London".into());
        p.state = Some("Greater London".into());
        p.country = Some("United Kingdom".into());
        assert_eq!(UserProfile::completion_percentage(Some(&p)), 100);
        assert!(UserProfile::missing_fields(Some(&p)).is_empty());
    }

    #[test]
    fn completion_never_decreases_as_fields_are_filled() {
        let mut p = profile();
        let mut last = UserProfile::completion_percentage(Some(&p));

        let steps: [fn(&mut UserProfile); 8] = [
            |p| p.first_name = Some("A".into()),
            |p| p.last_name = Some("B".into()),
            |p| p.date_of_birth = NaiveDate::from_ymd_opt(2000, 1, 1),
            |p| p.gender = Some("other".into()),
            |p| p.phone = Some("0123456789".into()),
            |p| p.city = Some("Lagos".into()),
            |p| p.state = Some("Lagos".into()),
            |p| p.country = Some("Nigeria".into()),
        ];
        for step in steps {
            step(&mut p);
            let now = UserProfile::completion_percentage(Some(&p));
            assert!(now > last, "{} should exceed {}", now, last);
            last = now;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn blank_values_do_not_count() {
        let mut p = profile();
        p.first_name = Some("   ".into());
        p.country = Some("Kenya".into());

        assert_eq!(UserProfile::completion_percentage(Some(&p)), 13);
        assert!(UserProfile::missing_fields(Some(&p)).contains(&"first_name"));
    }

    #[test]
    fn avatar_url_encodes_the_name() {
        assert_eq!(
            avatar_url(Some("José"), Some("O'Neil"), 64),
            "https://ui-avatars.com/api/?name=Jos%C3%A9%20O'Neil&size=64&background=3B82F6&color=ffffff"
        );
        assert_eq!(
            avatar_url(None, Some(""), 32),
            "https://ui-avatars.com/api/?name=User&size=32&background=3B82F6&color=ffffff"
        );
    }

    #[test]
    fn avatar_only_for_named_profiles() {
        let mut p = profile();
        assert!(p.avatar_url().is_none());
        p.last_name = Some("Okafor".into());
        assert!(p.avatar_url().unwrap().contains("name=Okafor&"));
    }

    #[test]
    fn avatar_size_is_clamped() {
        assert_eq!(clamp_avatar_size(None), 64);
        assert_eq!(clamp_avatar_size(Some(4)), 16);
        assert_eq!(clamp_avatar_size(Some(512)), 128);
        assert_eq!(clamp_avatar_size(Some(100)), 100);
    }

    #[test]
    fn patch_lists_present_fields_only() {
        let patch: ProfilePatch =
            serde_json::from_str(r#"{"bio": null, "city": "Accra", "unknown": 1}"#).unwrap();

        let mut names = patch.field_names();
        names.sort();
        assert_eq!(names, vec!["bio", "city"]);
        assert_eq!(patch.bio, Some(None));
        assert!(!patch.is_empty());
        assert!(ProfilePatch::default().is_empty());
    }
}
