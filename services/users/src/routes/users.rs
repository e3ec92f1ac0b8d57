//! User account routes

use axum::{
    Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{
    activity::MAX_WINDOW_DAYS,
    error::{ApiError, ApiResult},
    extractors::{AppJson, AppQuery, ClientInfo, TargetUserId},
    jwt::Principal,
    middleware::{auth_middleware, authorize},
    models::{
        ActivityType, NewActivity, Role, UserFilter, UserProfile, UserSummary, UserUpdate,
        profile::{DEFAULT_AVATAR_SIZE, avatar_url},
    },
    policy::AccessPolicy,
    repositories::activity::ActivityFilter,
    response::{ApiResponse, Created},
    routes::resolve_user,
    state::AppState,
    validation::{validate_email, validate_new_user},
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;
const SEARCH_LIMIT: i64 = 20;
const DEFAULT_ACTIVITY_PAGE_SIZE: i64 = 20;
const DEFAULT_SUMMARY_DAYS: u32 = 30;

pub fn router(state: AppState) -> Router<AppState> {
    let own = Router::new()
        .route("/me", get(get_me).put(update_me).delete(deactivate_me))
        .route("/me/export", get(export_me))
        .route_layer(from_fn_with_state(AccessPolicy::AUTHENTICATED, authorize));

    let staff = Router::new()
        .route("/", get(list_users))
        .route("/search/:query", get(search_users))
        .route_layer(from_fn_with_state(AccessPolicy::PSYCHIATRIST_ONLY, authorize));

    let admin = Router::new()
        .route("/admin/count", get(count_users))
        .route_layer(from_fn_with_state(AccessPolicy::ADMIN_ONLY, authorize));

    let by_id = Router::new()
        .route("/:id", get(get_user))
        .route("/:id/activities", get(list_activities))
        .route("/:id/activities/summary", get(activity_summary))
        .route_layer(from_fn_with_state(
            AccessPolicy::SELF_OR_PSYCHIATRIST,
            authorize,
        ));

    Router::new()
        .merge(own)
        .merge(staff)
        .merge(admin)
        .merge(by_id)
        .route_layer(from_fn_with_state(state, auth_middleware))
        .route("/create", post(create_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub auth_user_id: Option<i64>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub activity_type: Option<String>,
    /// RFC 3339 lower bound on `created_at`
    pub start_date: Option<DateTime<Utc>>,
    /// RFC 3339 upper bound on `created_at`
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<u32>,
}

/// Page number and size clamped to sane bounds, with the derived offset
fn paginate(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page - 1).saturating_mul(limit))
}

fn pagination(page: i64, limit: i64, total: i64) -> Value {
    json!({
        "page": page,
        "limit": limit,
        "total": total,
        "pages": (total + limit - 1) / limit,
    })
}

/// Summary with its derived avatar and completion score
async fn summary_json(state: &AppState, summary: UserSummary) -> ApiResult<Value> {
    let profile = state.profile_repository.find_by_user_id(summary.id).await?;
    let picture = avatar_url(
        summary.first_name.as_deref(),
        summary.last_name.as_deref(),
        DEFAULT_AVATAR_SIZE,
    );

    let mut user = serde_json::to_value(&summary).map_err(|e| ApiError::Internal(e.to_string()))?;
    user["profile_picture_url"] = json!(picture);
    user["profile_completion"] = json!(UserProfile::completion_percentage(profile.as_ref()));
    Ok(user)
}

async fn find_summary(state: &AppState, auth_user_id: i32) -> ApiResult<Value> {
    let summary = state
        .user_repository
        .find_summary_by_auth_user_id(auth_user_id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    summary_json(state, summary).await
}

/// Provision a user on behalf of the auth service
pub async fn create_user(
    State(state): State<AppState>,
    client: ClientInfo,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let new_user = validate_new_user(
        payload.auth_user_id,
        payload.email.as_deref(),
        payload.role.as_deref(),
    )
    .map_err(ApiError::Validation)?;

    if state
        .user_repository
        .find_by_auth_user_id(new_user.auth_user_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }
    if state
        .user_repository
        .find_by_email(&new_user.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Email already in use".to_string()));
    }

    let user = state.user_repository.create(&new_user).await?;
    state.preferences_repository.find_or_create(user.id).await?;

    info!("Created user {} (auth id {})", user.id, user.auth_user_id);
    state.activity_log.record(
        NewActivity::new(user.id, ActivityType::UserCreated, "User account created")
            .metadata(json!({ "email": user.email, "role": user.role }))
            .client(client.ip_address, client.user_agent),
    );

    Ok(Created(ApiResponse::with_message(
        "User created successfully",
        json!({ "user": user }),
    )))
}

pub async fn get_me(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<impl IntoResponse> {
    let user = find_summary(&state, principal.subject).await?;
    Ok(ApiResponse::data(json!({ "user": user })))
}

pub async fn update_me(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
    AppJson(payload): AppJson<UpdateMeRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;

    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| *email != user.email);
    let Some(email) = email else {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    };
    validate_email(email).map_err(|e| ApiError::Validation(vec![e]))?;

    if let Some(existing) = state.user_repository.find_by_email(email).await? {
        if existing.id != user.id {
            return Err(ApiError::Conflict("Email already in use".to_string()));
        }
    }

    let update = UserUpdate {
        email: Some(email.to_string()),
        ..Default::default()
    };
    let updated = state
        .user_repository
        .update(user.id, &update)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    state.activity_log.record(
        NewActivity::new(user.id, ActivityType::UserUpdated, "User account updated")
            .metadata(json!({ "updated_fields": update.field_names() }))
            .client(client.ip_address, client.user_agent),
    );

    Ok(ApiResponse::with_message(
        "User updated successfully",
        json!({ "user": updated }),
    ))
}

pub async fn deactivate_me(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let deactivated = state
        .user_repository
        .deactivate(user.id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    info!("Deactivated user {}", deactivated.id);
    state.activity_log.record(
        NewActivity::new(user.id, ActivityType::UserDeleted, "User account deactivated")
            .metadata(json!({ "deactivated_at": deactivated.updated_at }))
            .client(client.ip_address, client.user_agent),
    );

    Ok(ApiResponse::message("User account deactivated successfully"))
}

/// Everything stored about the caller
pub async fn export_me(
    State(state): State<AppState>,
    principal: Principal,
    client: ClientInfo,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, principal.subject).await?;
    let profile = state.profile_repository.find_by_user_id(user.id).await?;
    let preferences = state.preferences_repository.find_by_user_id(user.id).await?;
    let mental_health_profile = state.mental_health_repository.find_by_user_id(user.id).await?;
    let exported_at = Utc::now();

    state.activity_log.record(
        NewActivity::new(user.id, ActivityType::DataExport, "User data exported")
            .metadata(json!({ "export_date": exported_at }))
            .client(client.ip_address, client.user_agent),
    );

    Ok(ApiResponse::with_message(
        "User data exported successfully",
        json!({
            "user": user,
            "profile": profile,
            "preferences": preferences,
            "mental_health_profile": mental_health_profile,
            "exported_at": exported_at,
        }),
    ))
}

pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit, offset) = paginate(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let filter = UserFilter {
        role: query.role,
        search: query.search.filter(|s| !s.trim().is_empty()),
        limit,
        offset,
    };

    let users = state.user_repository.list(&filter).await?;
    let total = state.user_repository.count(&filter).await?;

    Ok(ApiResponse::data(json!({
        "users": users,
        "pagination": pagination(page, limit, total),
    })))
}

pub async fn search_users(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let filter = UserFilter {
        search: Some(query.clone()),
        limit: SEARCH_LIMIT,
        ..Default::default()
    };
    let users = state.user_repository.list(&filter).await?;

    Ok(ApiResponse::data(json!({ "users": users, "query": query })))
}

pub async fn count_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let count = state.user_repository.count_active().await?;
    Ok(ApiResponse::data(json!({ "count": count })))
}

pub async fn get_user(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
) -> ApiResult<impl IntoResponse> {
    let user = find_summary(&state, auth_user_id).await?;
    Ok(ApiResponse::data(json!({ "user": user })))
}

pub async fn list_activities(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
    AppQuery(query): AppQuery<ActivityQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(&state, auth_user_id).await?;
    let (page, limit, offset) = paginate(query.page, query.limit, DEFAULT_ACTIVITY_PAGE_SIZE);
    let filter = ActivityFilter {
        activity_type: query.activity_type,
        since: query.start_date,
        until: query.end_date,
        limit,
        offset,
    };

    let (activities, total) = state.activity_log.list(user.id, &filter).await?;

    Ok(ApiResponse::data(json!({
        "activities": activities,
        "pagination": pagination(page, limit, total),
    })))
}

pub async fn activity_summary(
    State(state): State<AppState>,
    TargetUserId(auth_user_id): TargetUserId,
    AppQuery(query): AppQuery<SummaryQuery>,
) -> ApiResult<impl IntoResponse> {
    let days = query.days.unwrap_or(DEFAULT_SUMMARY_DAYS);
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(ApiError::Validation(vec![format!(
            "days must be between 1 and {}",
            MAX_WINDOW_DAYS
        )]));
    }
    let user = resolve_user(&state, auth_user_id).await?;
    let summary = state.activity_log.summary(user.id, days).await?;

    Ok(ApiResponse::data(json!({ "summary": summary, "days": days })))
}
