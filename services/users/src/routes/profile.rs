//! Profile routes

use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::{ApiError, ApiResult},
    extractors::{AppJson, AppQuery, ClientInfo, TargetUserId},
    jwt::Principal,
    middleware::{auth_middleware, authorize},
    models::{
        ActivityType, NewActivity, ProfilePatch, Role, User, UserProfile,
        profile::{REQUIRED_PROFILE_FIELDS, avatar_url, clamp_avatar_size},
    },
    policy::AccessPolicy,
    response::ApiResponse,
    routes::resolve_user,
    state::AppState,
    validation::validate_profile,
};

pub fn router(state: AppState) -> Router<AppState> {
    let own = Router::new()
        .route("/me", get(get_my_profile).put(update_my_profile))
        .route("/me/picture", get(get_picture))
        .route("/me/completion", get(get_completion))
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

#[derive(Debug, Default, Deserialize)]
pub struct PictureQuery {
    pub size: Option<u32>,
}

/// `{profile, completion_percentage}` with the derived avatar merged in
fn profile_body(profile: Option<&UserProfile>) -> ApiResult<Value> {
    let mut body = match profile {
        Some(profile) => {
            serde_json::to_value(profile).map_err(|e| ApiError::Internal(e.to_string()))?
        }
        None => json!({}),
    };
    body["profile_picture_url"] = json!(profile.and_then(UserProfile::avatar_url));

    Ok(json!({
        "profile": body,
        "completion_percentage": UserProfile::completion_percentage(profile),
    }))
}

async fn read_profile(state: &AppState, user: &User) -> ApiResult<Value> {
    let profile = state.profile_repository.find_by_user_id(user.id).await?;
    profile_body(profile.as_ref())
}

async fn write_profile(
    state: &AppState,
    user: &User,
    principal: &Principal,
    client: ClientInfo,
    mut patch: ProfilePatch,
) -> ApiResult<Value> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let errors = validate_profile(&mut patch);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let profile = state.profile_repository.upsert(user.id, &patch).await?;

    let updated_by = if principal.subject == user.auth_user_id {
        "self"
    } else {
        Role::Psychiatrist.as_str()
    };
    state.activity_log.record(
        NewActivity::new(user.id, ActivityType::ProfileUpdate, "User profile updated")
            .metadata(json!({
                "updated_fields": patch.field_names(),
                "updated_by": updated_by,
            }))
            .client(client.ip_address, client.user_agent),
    );

    profile_body(Some(&profile))
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    Ok(ApiResponse::data(read_profile(&state, &user).await?))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    AppJson(patch): AppJson<ProfilePatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let body = write_profile(&state, &user, &principal, client, patch).await?;
    Ok(ApiResponse::with_message("Profile updated successfully", body))
}

pub async fn get_profile(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, auth_user_id).await?;
    Ok(ApiResponse::data(read_profile(&state, &user).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    principal: Principal,
    TargetUserId(auth_user_id): TargetUserId,
    client: ClientInfo,
    AppJson(patch): AppJson<ProfilePatch>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, auth_user_id).await?;
    let body = write_profile(&state, &user, &principal, client, patch).await?;
    Ok(ApiResponse::with_message("Profile updated successfully", body))
}

pub async fn get_picture(
    State(state): State<AppState>,
    principal: Principal,
    AppQuery(query): AppQuery<PictureQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let profile = state.profile_repository.find_by_user_id(user.id).await?;
    let size = clamp_avatar_size(query.size);

    let url = avatar_url(
        profile.as_ref().and_then(|p| p.first_name.as_deref()),
        profile.as_ref().and_then(|p| p.last_name.as_deref()),
        size,
    );

    Ok(ApiResponse::data(json!({
        "profile_picture_url": url,
        "size": size,
    })))
}

pub async fn get_completion(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let profile = state.profile_repository.find_by_user_id(user.id).await?;
    Ok(ApiResponse::data(completion_body(profile.as_ref())))
}

fn completion_body(profile: Option<&UserProfile>) -> Value {
    let percentage = UserProfile::completion_percentage(profile);
    let missing = UserProfile::missing_fields(profile);
    let total = REQUIRED_PROFILE_FIELDS.len();

    json!({
        "completion_percentage": percentage,
        "is_complete": percentage == 100,
        "total_required_fields": total,
        "completed_fields": total - missing.len(),
        "missing_fields": missing,
    })
}
