//! Request extractors shared by the handlers

use axum::{
    async_trait,
    extract::{
        ConnectInfo, FromRequest, FromRequestParts, Query, RawPathParams, Request,
        rejection::RawPathParamsRejection,
    },
    http::{header::USER_AGENT, request::Parts},
};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::jwt::Principal;
use crate::policy::AccessDenied;

/// Path parameter names that identify the target user of a route
const TARGET_PARAMS: [&str; 2] = ["id", "userId"];

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AccessDenied::Unauthenticated.into())
    }
}

/// Target user id from the route path, parsed from `:id` or `:userId`
pub fn target_user_id(params: &RawPathParams) -> Option<i32> {
    params
        .iter()
        .find(|(name, _)| TARGET_PARAMS.contains(name))
        .and_then(|(_, value)| value.parse().ok())
}

/// The external auth user id named by the route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetUserId(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for TargetUserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let params = RawPathParams::from_request_parts(parts, state)
            .await
            .map_err(|e: RawPathParamsRejection| ApiError::BadRequest(e.body_text()))?;

        target_user_id(&params)
            .map(TargetUserId)
            .ok_or_else(|| ApiError::BadRequest("Invalid user id".to_string()))
    }
}

/// Network metadata recorded alongside activities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_parts(parts: &Parts) -> Self {
        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            ip_address,
            user_agent,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// JSON body whose rejections render as validation envelopes
#[derive(Debug)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Query string whose rejections render as validation envelopes
#[derive(Debug)]
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}
