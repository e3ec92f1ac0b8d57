//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    activity::ActivityLog,
    config::AppConfig,
    jwt::TokenVerifier,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{
        ActivityRepository, MentalHealthRepository, PreferencesRepository, ProfileRepository,
        UserRepository,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub token_verifier: TokenVerifier,
    pub rate_limiter: RateLimiter,
    pub user_repository: UserRepository,
    pub profile_repository: ProfileRepository,
    pub preferences_repository: PreferencesRepository,
    pub mental_health_repository: MentalHealthRepository,
    pub activity_log: ActivityLog,
}

impl AppState {
    /// Wire repositories and services around one connection pool
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        let token_verifier = TokenVerifier::new(config.jwt_secret.as_deref());
        let rate_limiter = RateLimiter::new(RateLimiterConfig {
            max_requests: config.rate_limit_max_requests,
            window: config.rate_limit_window,
        });

        Self {
            user_repository: UserRepository::new(pool.clone()),
            profile_repository: ProfileRepository::new(pool.clone()),
            preferences_repository: PreferencesRepository::new(pool.clone()),
            mental_health_repository: MentalHealthRepository::new(pool.clone()),
            activity_log: ActivityLog::new(ActivityRepository::new(pool)),
            config: Arc::new(config),
            token_verifier,
            rate_limiter,
        }
    }
}
