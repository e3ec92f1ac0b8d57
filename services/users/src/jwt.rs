//! Bearer token verification
//!
//! Tokens are issued by the external auth service and signed with a shared
//! HMAC secret. This service only verifies them and turns the claims into a
//! [`Principal`]; it never issues or refreshes tokens.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::models::Role;

/// Claims carried by an access token
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// External auth user id, encoded as a number or a numeric string
    #[serde(deserialize_with = "numeric_subject")]
    pub sub: i64,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub iat: Option<i64>,
    pub exp: i64,
}

fn numeric_subject<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Subject {
        Number(i64),
        Text(String),
    }

    match Subject::deserialize(deserializer)? {
        Subject::Number(n) => Ok(n),
        Subject::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Verified identity attached to a request
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    /// Subject id, in the same id space as `users.auth_user_id`
    pub subject: i32,
    pub email: Option<String>,
    pub role: Role,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Token verification failure
#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("JWT secret is not configured")]
    MissingSecret,
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret => ApiError::Configuration(err.to_string()),
            TokenError::Expired | TokenError::Invalid => ApiError::Unauthorized(err.to_string()),
        }
    }
}

/// HS256 token verifier
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier. Without a secret every verification fails with
    /// [`TokenError::MissingSecret`].
    pub fn new(secret: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            decoding_key: secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation,
        }
    }

    /// Verify the signature and expiry of a token and extract its principal
    pub fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let Some(key) = &self.decoding_key else {
            error!("JWT_SECRET is not configured");
            return Err(TokenError::MissingSecret);
        };

        let claims = decode::<Claims>(token, key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    debug!("Rejected token: {}", e);
                    TokenError::Invalid
                }
            })?
            .claims;

        let subject = i32::try_from(claims.sub).map_err(|_| TokenError::Invalid)?;
        let role = claims.role.parse::<Role>().map_err(|e| {
            debug!("Rejected token: {}", e);
            TokenError::Invalid
        })?;

        Ok(Principal {
            subject,
            email: claims.email,
            role,
            issued_at: claims.iat.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .ok_or(TokenError::Invalid)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};

    pub const SECRET: &str = "test-secret";

    pub fn sign(claims: &Value, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    /// A token valid for one hour
    pub fn token_for(sub: i64, role: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        sign(
            &json!({
                "sub": sub,
                "email": format!("user{}@example.com", sub),
                "role": role,
                "iat": now,
                "exp": now + 3600,
            }),
            SECRET,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{SECRET, sign, token_for};
    use super::*;
    use serde_json::json;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(Some(SECRET))
    }

    #[test]
    fn valid_token_yields_signed_subject() {
        let principal = verifier().verify(&token_for(42, "psychiatrist")).unwrap();

        assert_eq!(principal.subject, 42);
        assert_eq!(principal.role, Role::Psychiatrist);
        assert_eq!(principal.email.as_deref(), Some("user42@example.com"));
        assert!(principal.issued_at.is_some());
        assert!(principal.expires_at > Utc::now());
    }

    #[test]
    fn string_subject_is_accepted() {
        let now = Utc::now().timestamp();
        let token = sign(
            &json!({"sub": "17", "role": "user", "exp": now + 60}),
            SECRET,
        );

        let principal = verifier().verify(&token).unwrap();
        assert_eq!(principal.subject, 17);
        assert!(principal.email.is_none());
        assert!(principal.issued_at.is_none());
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let forged = sign(
            &json!({"sub": 2, "role": "admin", "exp": Utc::now().timestamp() + 60}),
            SECRET,
        );
        let forged_payload = forged.split('.').nth(1).unwrap();
        let token = token_for(1, "user");
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged_payload;

        assert_eq!(verifier().verify(&parts.join(".")), Err(TokenError::Invalid));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = sign(
            &json!({"sub": 1, "role": "user", "exp": Utc::now().timestamp() + 60}),
            "another-secret",
        );
        assert_eq!(verifier().verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let now = Utc::now().timestamp();
        let token = sign(
            &json!({"sub": 1, "role": "user", "iat": now - 120, "exp": now - 60}),
            SECRET,
        );
        assert_eq!(verifier().verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn unknown_role_is_invalid() {
        let token = token_for(1, "superuser");
        assert_eq!(verifier().verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(verifier().verify("not.a.jwt"), Err(TokenError::Invalid));
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let result = TokenVerifier::new(None).verify(&token_for(1, "user"));
        assert_eq!(result, Err(TokenError::MissingSecret));
        assert!(matches!(
            ApiError::from(TokenError::MissingSecret),
            ApiError::Configuration(_)
        ));
    }
}
