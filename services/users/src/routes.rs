//! User service routes

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method, StatusCode, Uri,
        header::{AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue},
    },
    middleware,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{expose_error_details, rate_limit, request_logger},
    models::User,
    state::AppState,
};

pub mod mental_health;
pub mod preferences;
pub mod profile;
pub mod users;

/// Largest accepted request body
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Create the router for the user service
pub fn create_router(state: AppState) -> Result<Router, InvalidHeaderValue> {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(&state.config.cors_origin)?)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    let api = Router::new()
        .nest("/api/users", users::router(state.clone()))
        .nest("/api/profile", profile::router(state.clone()))
        .nest("/api/preferences", preferences::router(state.clone()))
        .nest("/api/mental-health", mental_health::router(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Ok(Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(middleware::from_fn_with_state(
            state.config.environment,
            expose_error_details,
        ))
        .layer(middleware::from_fn(request_logger))
        .layer(cors)
        .with_state(state))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "User Service is healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "user-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Endpoint not found",
            "path": uri.path(),
        })),
    )
}

/// Look up the user whose external auth id is `auth_user_id`
pub(crate) async fn resolve_user(state: &AppState, auth_user_id: i32) -> ApiResult<User> {
    state
        .user_repository
        .find_by_auth_user_id(auth_user_id)
        .await?
        .ok_or_else(ApiError::user_not_found)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::config::Environment;
    use crate::jwt::testing::token_for;

    #[tokio::test]
    async fn health_reports_service() {
        let response = send(test_router(test_config()), Method::GET, "/health", None, None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "User Service is healthy");
        assert_eq!(body["service"], "user-service");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_enveloped_404() {
        let response = send(
            test_router(test_config()),
            Method::GET,
            "/api/nothing/here",
            None,
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Endpoint not found");
        assert_eq!(body["path"], "/api/nothing/here");
    }

    #[tokio::test]
    async fn rate_limit_applies_to_api_routes() {
        let mut config = test_config();
        config.rate_limit_max_requests = 2;
        let router = test_router(config);

        for _ in 0..2 {
            let response = send(router.clone(), Method::GET, "/api/users/me", None, None).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = send(router.clone(), Method::GET, "/api/users/me", None, None).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(
            body["message"],
            "Too many requests from this IP, please try again later."
        );

        let response = send(router, Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_secret_is_a_server_configuration_error() {
        let mut config = test_config();
        config.jwt_secret = None;

        let response = send(
            test_router(config),
            Method::GET,
            "/api/users/me",
            Some(&token_for(1, "user")),
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Server configuration error");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn development_exposes_server_error_detail() {
        let mut config = test_config();
        config.jwt_secret = None;
        config.environment = Environment::Development;

        let response = send(
            test_router(config),
            Method::GET,
            "/api/users/me",
            Some(&token_for(1, "user")),
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("not configured"));
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn provisioned_user_can_change_theme() {
        use common::database::{DatabaseConfig, init_pool};
        use serde_json::json;

        let pool = init_pool(&DatabaseConfig::from_env().unwrap()).await.unwrap();
        common::schema::initialize_schema(&pool).await.unwrap();
        let router = create_router(AppState::new(pool, test_config())).unwrap();

        let auth_id = 1_000_000 + i64::from(Utc::now().timestamp_subsec_micros());
        let token = token_for(auth_id, "user");

        let response = send(
            router.clone(),
            Method::POST,
            "/api/users/create",
            None,
            Some(json!({
                "auth_user_id": auth_id,
                "email": format!("e2e-{}@example.com", auth_id),
                "role": "user",
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["data"]["user"]["auth_user_id"], auth_id);

        let response = send(router.clone(), Method::GET, "/api/preferences/me", Some(&token), None).await;
        let defaults = body_json(response).await["data"]["preferences"].clone();
        assert_eq!(defaults["theme"], "light");

        let response = send(
            router.clone(),
            Method::PUT,
            "/api/preferences/me",
            Some(&token),
            Some(json!({ "theme": "dark" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(router.clone(), Method::GET, "/api/preferences/me", Some(&token), None).await;
        let updated = body_json(response).await["data"]["preferences"].clone();
        assert_eq!(updated["theme"], "dark");
        for field in [
            "language",
            "timezone",
            "email_notifications",
            "push_notifications",
            "sms_notifications",
            "appointment_reminders",
            "wellness_tips",
            "marketing_emails",
            "data_sharing",
            "session_recording",
        ] {
            assert_eq!(updated[field], defaults[field], "{}", field);
        }

        let response = send(
            router.clone(),
            Method::POST,
            "/api/users/create",
            None,
            Some(json!({
                "auth_user_id": auth_id,
                "email": "someone-else@example.com",
                "role": "user",
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["message"], "User already exists");

        let response = send(router.clone(), Method::DELETE, "/api/users/me", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_allows_only_the_configured_origin() {
        let router = test_router(test_config());
        let request = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/health")
            .header("Origin", "http://localhost:3000")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = tower::ServiceExt::oneshot(router, request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }
}
