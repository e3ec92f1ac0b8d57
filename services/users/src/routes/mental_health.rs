//! Mental-health profile routes

use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};

use crate::{
    error::{ApiError, ApiResult},
    extractors::{AppJson, ClientInfo, TargetUserId},
    jwt::Principal,
    middleware::{auth_middleware, authorize},
    models::{ActivityType, MentalHealthPatch, MentalHealthProfile, NewActivity, User},
    policy::AccessPolicy,
    response::ApiResponse,
    routes::resolve_user,
    state::AppState,
    validation::validate_mental_health,
};

pub fn router(state: AppState) -> Router<AppState> {
    let own = Router::new()
        .route("/me", get(get_my_profile).put(update_my_profile))
        .route_layer(from_fn_with_state(AccessPolicy::AUTHENTICATED, authorize));

    let by_id = Router::new()
        .route("/:userId", get(get_profile).put(update_profile))
        .route_layer(from_fn_with_state(
            AccessPolicy::SELF_OR_PSYCHIATRIST,
            authorize,
        ));

    Router::new()
        .merge(own)
        .merge(by_id)
        .route_layer(from_fn_with_state(state, auth_middleware))
}

async fn write_profile(
    state: &AppState,
    user: &User,
    client: ClientInfo,
    mut patch: MentalHealthPatch,
) -> ApiResult<MentalHealthProfile> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let errors = validate_mental_health(&mut patch);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let profile = state
        .mental_health_repository
        .upsert(user.id, &patch)
        .await?;

    state.activity_log.record(
        NewActivity::new(
            user.id,
            ActivityType::MentalHealthProfileUpdate,
            "Mental health profile updated",
        )
        .metadata(json!({ "updated_fields": patch.field_names() }))
        .client(client.ip_address, client.user_agent),
    );

    Ok(profile)
}

async fn read_profile(state: &AppState, user: &User) -> ApiResult<ApiResponse<Value>> {
    let profile = state
        .mental_health_repository
        .find_by_user_id(user.id)
        .await?;
    Ok(ApiResponse::data(json!({ "mental_health_profile": profile })))
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    read_profile(&state, &user).await
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    AppJson(patch): AppJson<MentalHealthPatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let profile = write_profile(&state, &user, client, patch).await?;

    Ok(ApiResponse::with_message(
        "Mental health profile updated successfully",
        json!({ "mental_health_profile": profile }),
    ))
}

pub async fn get_profile(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, auth_user_id).await?;
    read_profile(&state, &user).await
}

pub async fn update_profile(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
    client: ClientInfo,
    AppJson(patch): AppJson<MentalHealthPatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, auth_user_id).await?;
    let profile = write_profile(&state, &user, client, patch).await?;

    Ok(ApiResponse::with_message(
        "Mental health profile updated successfully",
        json!({ "mental_health_profile": profile }),
    ))
}
