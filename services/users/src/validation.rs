//! Input validation utilities
//!
//! Validators collect every problem instead of stopping at the first one, and
//! normalize the input in place (trimming text) on the way.

use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::{MentalHealthPatch, NewUser, PreferencesPatch, ProfilePatch, Role};

const GENDERS: [&str; 5] = ["male", "female", "non-binary", "prefer-not-to-say", "other"];
const THEMES: [&str; 3] = ["light", "dark", "system"];
const LANGUAGES: [&str; 10] = ["en", "es", "fr", "de", "it", "pt", "ru", "zh", "ja", "ko"];
const PRIMARY_CONCERNS: [&str; 13] = [
    "anxiety",
    "depression",
    "stress",
    "trauma",
    "relationships",
    "work-life-balance",
    "grief",
    "addiction",
    "eating-disorders",
    "sleep-issues",
    "anger-management",
    "self-esteem",
    "other",
];
const SESSION_TYPES: [&str; 4] = ["individual", "group", "couples", "family"];
const COMMUNICATION_STYLES: [&str; 3] = ["direct", "gentle", "collaborative"];
const SESSION_FREQUENCIES: [&str; 4] = ["weekly", "bi-weekly", "monthly", "as-needed"];
const SESSION_DURATIONS: [i32; 4] = [30, 45, 60, 90];
const PREFERRED_TIMES: [&str; 3] = ["morning", "afternoon", "evening"];
const THERAPIST_GENDERS: [&str; 3] = ["male", "female", "no-preference"];

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("email is required".to_string());
    }

    if email.len() > 254 {
        return Err("email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("email must be a valid email".to_string());
    }

    Ok(())
}

/// Validate phone number format and length
pub fn validate_phone(field: &str, phone: &str) -> Result<(), String> {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("Failed to compile phone regex"));

    if !regex.is_match(phone) {
        return Err(format!("{} must be a valid phone number", field));
    }

    let len = phone.chars().count();
    if !(10..=20).contains(&len) {
        return Err(format!("{} must be between 10 and 20 characters long", field));
    }

    Ok(())
}

/// Validate the user creation request sent by the auth service
pub fn validate_new_user(
    auth_user_id: Option<i64>,
    email: Option<&str>,
    role: Option<&str>,
) -> Result<NewUser, Vec<String>> {
    let mut errors = Vec::new();

    let auth_user_id = match auth_user_id.map(i32::try_from) {
        None => {
            errors.push("auth_user_id is required".to_string());
            None
        }
        Some(Ok(id)) if id > 0 => Some(id),
        Some(_) => {
            errors.push("auth_user_id must be a positive integer".to_string());
            None
        }
    };

    let email = email.map(str::trim).unwrap_or_default();
    if let Err(e) = validate_email(email) {
        errors.push(e);
    }

    let role = match role.map(str::parse::<Role>) {
        None => {
            errors.push("role is required".to_string());
            None
        }
        Some(Ok(role)) if role != Role::Admin => Some(role),
        Some(_) => {
            errors.push("role must be one of [user, psychiatrist]".to_string());
            None
        }
    };

    match (auth_user_id, role) {
        (Some(auth_user_id), Some(role)) if errors.is_empty() => Ok(NewUser {
            auth_user_id,
            email: email.to_string(),
            role,
        }),
        _ => Err(errors),
    }
}

/// Trim a present string in place
fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn check_length(
    errors: &mut Vec<String>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if len < min {
        if min == 1 {
            errors.push(format!("{} is not allowed to be empty", field));
        } else {
            errors.push(format!("{} must be at least {} characters long", field, min));
        }
    } else if len > max {
        errors.push(format!("{} must be at most {} characters long", field, max));
    }
}

fn check_one_of(errors: &mut Vec<String>, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errors.push(format!("{} must be one of [{}]", field, allowed.join(", ")));
    }
}

/// Validate and normalize a profile write
pub fn validate_profile(patch: &mut ProfilePatch) -> Vec<String> {
    let mut errors = Vec::new();

    for value in patch.text_fields_mut().into_iter().flatten().flatten() {
        trim_in_place(value);
    }

    for (field, value) in patch.text_fields() {
        let Some(Some(value)) = value else {
            continue;
        };

        match field {
            "first_name" | "last_name" => check_length(&mut errors, field, value, 1, 100),
            "gender" => check_one_of(&mut errors, field, value, &GENDERS),
            "phone" | "emergency_contact_phone" => {
                if let Err(e) = validate_phone(field, value) {
                    errors.push(e);
                }
            }
            "address_line_1" => check_length(&mut errors, field, value, 1, 255),
            "address_line_2" => check_length(&mut errors, field, value, 0, 255),
            "city" | "state" | "country" | "emergency_contact_name" => {
                check_length(&mut errors, field, value, 1, 100)
            }
            "postal_code" => check_length(&mut errors, field, value, 1, 20),
            "bio" => check_length(&mut errors, field, value, 0, 1000),
            "emergency_contact_relationship" => check_length(&mut errors, field, value, 1, 50),
            _ => {}
        }
    }

    if let Some(Some(date_of_birth)) = patch.date_of_birth {
        if date_of_birth > Utc::now().date_naive() {
            errors.push("date_of_birth must not be in the future".to_string());
        }
    }

    errors
}

/// Validate and normalize a preferences write
pub fn validate_preferences(patch: &mut PreferencesPatch) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(theme) = patch.theme.as_mut() {
        trim_in_place(theme);
        check_one_of(&mut errors, "theme", theme.as_str(), &THEMES);
    }

    if let Some(language) = patch.language.as_mut() {
        trim_in_place(language);
        check_one_of(&mut errors, "language", language.as_str(), &LANGUAGES);
    }

    if let Some(timezone) = patch.timezone.as_mut() {
        trim_in_place(timezone);
        check_length(&mut errors, "timezone", timezone.as_str(), 1, 50);
    }

    errors
}

fn check_list(
    errors: &mut Vec<String>,
    field: &str,
    items: &mut [String],
    max_items: usize,
    max_len: usize,
) {
    if items.len() > max_items {
        errors.push(format!("{} must contain at most {} items", field, max_items));
    }
    for (index, item) in items.iter_mut().enumerate() {
        trim_in_place(item);
        check_length(errors, &format!("{}[{}]", field, index), item.as_str(), 1, max_len);
    }
}

/// Validate and normalize a mental-health profile write
pub fn validate_mental_health(patch: &mut MentalHealthPatch) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(concerns) = patch.primary_concerns.as_mut() {
        if concerns.len() > 10 {
            errors.push("primary_concerns must contain at most 10 items".to_string());
        }
        for (index, concern) in concerns.iter_mut().enumerate() {
            trim_in_place(concern);
            check_one_of(
                &mut errors,
                &format!("primary_concerns[{}]", index),
                concern.as_str(),
                &PRIMARY_CONCERNS,
            );
        }
    }

    if let Some(goals) = patch.therapy_goals.as_mut() {
        check_list(&mut errors, "therapy_goals", goals, 10, 200);
    }
    if let Some(medications) = patch.current_medications.as_mut() {
        check_list(&mut errors, "current_medications", medications, 20, 100);
    }
    if let Some(allergies) = patch.allergies.as_mut() {
        check_list(&mut errors, "allergies", allergies, 20, 100);
    }
    if let Some(conditions) = patch.medical_conditions.as_mut() {
        check_list(&mut errors, "medical_conditions", conditions, 20, 100);
    }

    if let Some(Some(prefs)) = patch.therapy_preferences.as_ref() {
        let choices = [
            ("session_type", &prefs.session_type, &SESSION_TYPES[..]),
            (
                "communication_style",
                &prefs.communication_style,
                &COMMUNICATION_STYLES[..],
            ),
            (
                "session_frequency",
                &prefs.session_frequency,
                &SESSION_FREQUENCIES[..],
            ),
            ("preferred_time", &prefs.preferred_time, &PREFERRED_TIMES[..]),
            (
                "therapist_gender_preference",
                &prefs.therapist_gender_preference,
                &THERAPIST_GENDERS[..],
            ),
        ];
        for (field, value, allowed) in choices {
            if let Some(value) = value {
                check_one_of(
                    &mut errors,
                    &format!("therapy_preferences.{}", field),
                    value,
                    allowed,
                );
            }
        }

        if let Some(duration) = prefs.session_duration {
            if !SESSION_DURATIONS.contains(&duration) {
                errors.push(
                    "therapy_preferences.session_duration must be one of [30, 45, 60, 90]"
                        .to_string(),
                );
            }
        }

        if let Some(considerations) = &prefs.cultural_considerations {
            check_length(
                &mut errors,
                "therapy_preferences.cultural_considerations",
                considerations,
                0,
                500,
            );
        }
    }

    for (field, value, max) in [
        ("crisis_plan", patch.crisis_plan.as_mut(), 1000),
        ("support_system", patch.support_system.as_mut(), 500),
    ] {
        if let Some(Some(text)) = value {
            trim_in_place(text);
            check_length(&mut errors, field, text.as_str(), 0, max);
        }
    }

    for (field, value) in [
        ("stress_level", patch.stress_level),
        ("sleep_quality", patch.sleep_quality),
    ] {
        if let Some(Some(level)) = value {
            if !(1..=10).contains(&level) {
                errors.push(format!("{} must be between 1 and 10", field));
            }
        }
    }

    errors
}
