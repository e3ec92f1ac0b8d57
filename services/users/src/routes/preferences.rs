//! Preferences routes, including the notification and privacy sub-views

use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    extractors::{AppJson, ClientInfo, TargetUserId},
    jwt::Principal,
    middleware::{auth_middleware, authorize},
    models::{
        ActivityType, NewActivity, NotificationPatch, NotificationPreferences, PreferencesPatch,
        PrivacyPatch, PrivacyPreferences, User, UserPreferences,
    },
    policy::AccessPolicy,
    response::ApiResponse,
    routes::resolve_user,
    state::AppState,
    validation::validate_preferences,
};

pub fn router(state: AppState) -> Router<AppState> {
    let own = Router::new()
        .route("/me", get(get_my_preferences).put(update_my_preferences))
        .route(
            "/me/notifications",
            get(get_notifications).put(update_notifications),
        )
        .route("/me/privacy", get(get_privacy).put(update_privacy))
        .route("/me/reset", post(reset_preferences))
        .route_layer(from_fn_with_state(AccessPolicy::AUTHENTICATED, authorize));

    let by_id = Router::new()
        .route("/:userId", get(get_preferences).put(update_preferences))
        .route_layer(from_fn_with_state(
            AccessPolicy::SELF_OR_PSYCHIATRIST,
            authorize,
        ));

    Router::new()
        .merge(own)
        .merge(by_id)
        .route_layer(from_fn_with_state(state, auth_middleware))
}

/// Validate and apply a write, logging it under `activity_type`
async fn write_preferences(
    state: &AppState,
    user: &User,
    client: ClientInfo,
    mut patch: PreferencesPatch,
    activity_type: ActivityType,
    description: &str,
) -> ApiResult<UserPreferences> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let errors = validate_preferences(&mut patch);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let preferences = state.preferences_repository.upsert(user.id, &patch).await?;

    state.activity_log.record(
        NewActivity::new(user.id, activity_type, description)
            .metadata(json!({ "updated_fields": patch.field_names() }))
            .client(client.ip_address, client.user_agent),
    );

    Ok(preferences)
}

pub async fn get_my_preferences(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let preferences = state.preferences_repository.find_or_create(user.id).await?;
    Ok(ApiResponse::data(json!({ "preferences": preferences })))
}

pub async fn update_my_preferences(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    AppJson(patch): AppJson<PreferencesPatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let preferences = write_preferences(
        &state,
        &user,
        client,
        patch,
        ActivityType::PreferencesUpdate,
        "User preferences updated",
    )
    .await?;

    Ok(ApiResponse::with_message(
        "Preferences updated successfully",
        json!({ "preferences": preferences }),
    ))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, auth_user_id).await?;
    let preferences = state.preferences_repository.find_or_create(user.id).await?;
    Ok(ApiResponse::data(json!({ "preferences": preferences })))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
    client: ClientInfo,
    AppJson(patch): AppJson<PreferencesPatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, auth_user_id).await?;
    let preferences = write_preferences(
        &state,
        &user,
        client,
        patch,
        ActivityType::PreferencesUpdate,
        "User preferences updated",
    )
    .await?;

    Ok(ApiResponse::with_message(
        "Preferences updated successfully",
        json!({ "preferences": preferences }),
    ))
}

pub async fn get_notifications(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let preferences = state.preferences_repository.find_or_create(user.id).await?;
    let notifications = NotificationPreferences::from(&preferences);
    Ok(ApiResponse::data(json!({ "notifications": notifications })))
}

pub async fn update_notifications(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    AppJson(patch): AppJson<NotificationPatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let preferences = write_preferences(
        &state,
        &user,
        client,
        patch.into(),
        ActivityType::NotificationPreferencesUpdate,
        "Notification preferences updated",
    )
    .await?;
    let notifications = NotificationPreferences::from(&preferences);

    Ok(ApiResponse::with_message(
        "Notification preferences updated successfully",
        json!({ "notifications": notifications }),
    ))
}

pub async fn get_privacy(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let preferences = state.preferences_repository.find_or_create(user.id).await?;
    let privacy = PrivacyPreferences::from(&preferences);
    Ok(ApiResponse::data(json!({ "privacy": privacy })))
}

pub async fn update_privacy(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    AppJson(patch): AppJson<PrivacyPatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let preferences = write_preferences(
        &state,
        &user,
        client,
        patch.into(),
        ActivityType::PrivacyPreferencesUpdate,
        "Privacy preferences updated",
    )
    .await?;
    let privacy = PrivacyPreferences::from(&preferences);

    Ok(ApiResponse::with_message(
        "Privacy preferences updated successfully",
        json!({ "privacy": privacy }),
    ))
}

pub async fn reset_preferences(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let preferences = state.preferences_repository.reset(user.id).await?;

    state.activity_log.record(
        NewActivity::new(
            user.id,
            ActivityType::PreferencesReset,
            "Preferences reset to default",
        )
        .client(client.ip_address, client.user_agent),
    );

    Ok(ApiResponse::with_message(
        "Preferences reset to default successfully",
        json!({ "preferences": preferences }),
    ))
}
