//! Middleware for token validation, authorization and request plumbing

use axum::{
    Json,
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde_json::json;
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    config::Environment,
    error::{ApiError, ErrorDetail},
    extractors::{ClientInfo, target_user_id},
    jwt::Principal,
    policy::AccessPolicy,
    state::AppState,
};

/// Verify the bearer token and attach the [`Principal`] to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;

    let principal = state.token_verifier.verify(bearer.token())?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Enforce the route group's [`AccessPolicy`] against the attached principal
pub async fn authorize(
    State(policy): State<AccessPolicy>,
    params: Option<RawPathParams>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let target = params.as_ref().and_then(target_user_id);

    if let Err(denied) = policy.evaluate(req.extensions().get::<Principal>(), target) {
        warn!("{} {} refused: {}", req.method(), req.uri(), denied);
        return Err(denied.into());
    }

    Ok(next.run(req).await)
}

/// Reject clients that exceeded their request budget for the current window
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let key = ClientInfo::from_parts(&parts)
        .ip_address
        .unwrap_or_else(|| "unknown".to_string());

    if !state.rate_limiter.is_allowed(&key).await {
        return Err(ApiError::TooManyRequests);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Log `METHOD URI - STATUS - Nms` for every response
pub async fn request_logger(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    info!(
        "{} {} - {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}

/// In development, replace generic server-error bodies with the real error
pub async fn expose_error_details(
    State(environment): State<Environment>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    if !environment.exposes_error_details() {
        return response;
    }

    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(detail) => (
            response.status(),
            Json(json!({
                "success": false,
                "message": detail.message,
                "detail": detail.detail,
            })),
        )
            .into_response(),
        None => response,
    }
}
