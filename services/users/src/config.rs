//! Service configuration loaded from the environment

use serde::Deserialize;
use std::time::Duration;

const PRODUCTION_ORIGIN: &str = "https://mindnest-frontend.vercel.app";
const LOCAL_ORIGIN: &str = "http://localhost:3000";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    /// Whether error responses may carry internal details
    pub fn exposes_error_details(self) -> bool {
        self == Environment::Development
    }
}

/// Raw settings as read by the `config` crate
#[derive(Debug, Deserialize)]
struct RawSettings {
    port: u16,
    app_env: Environment,
    jwt_secret: Option<String>,
    cors_origin: Option<String>,
    rate_limit_window_ms: u64,
    rate_limit_max_requests: u32,
    activity_retention_days: u32,
    activity_prune_schedule: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the HTTP server binds to
    pub port: u16,
    pub environment: Environment,
    /// Shared secret for verifying bearer tokens. Absence is reported per
    /// request, not at startup.
    pub jwt_secret: Option<String>,
    /// The single origin allowed by CORS
    pub cors_origin: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    /// Activity rows older than this many days are pruned
    pub activity_retention_days: u32,
    /// Cron expression for the prune job; `None` disables scheduling
    pub activity_prune_schedule: Option<String>,
}

impl AppConfig {
    /// Create a new AppConfig from environment variables
    ///
    /// # Environment Variables
    /// - `PORT`: HTTP port (default: 3002)
    /// - `APP_ENV`: `development`, `production` or `test` (default: development)
    /// - `JWT_SECRET`: HMAC secret used to verify bearer tokens
    /// - `CORS_ORIGIN`: allowed origin (default depends on `APP_ENV`)
    /// - `RATE_LIMIT_WINDOW_MS`: rate limit window (default: 900000, 15 minutes)
    /// - `RATE_LIMIT_MAX_REQUESTS`: requests per window per IP (default: 100)
    /// - `ACTIVITY_RETENTION_DAYS`: activity retention (default: 365)
    /// - `ACTIVITY_PRUNE_SCHEDULE`: cron schedule for pruning (default: unset)
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let raw: RawSettings = config::Config::builder()
            .set_default("port", 3002_i64)?
            .set_default("app_env", "development")?
            .set_default("rate_limit_window_ms", 900_000_i64)?
            .set_default("rate_limit_max_requests", 100_i64)?
            .set_default("activity_retention_days", 365_i64)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawSettings) -> Self {
        let cors_origin = non_empty(raw.cors_origin).unwrap_or_else(|| {
            match raw.app_env {
                Environment::Production => PRODUCTION_ORIGIN,
                Environment::Development | Environment::Test => LOCAL_ORIGIN,
            }
            .to_string()
        });

        Self {
            port: raw.port,
            environment: raw.app_env,
            jwt_secret: non_empty(raw.jwt_secret),
            cors_origin,
            rate_limit_window: Duration::from_millis(raw.rate_limit_window_ms),
            rate_limit_max_requests: raw.rate_limit_max_requests,
            activity_retention_days: raw.activity_retention_days,
            activity_prune_schedule: non_empty(raw.activity_prune_schedule),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
