//! Follow and group API endpoints
//!
//! - GET/POST /api/v1/follow/ (`?search=<username>`)
//! - GET/POST /api/v1/group/

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::api::responses::FollowResponse;
use crate::models::{CreateGroupInput, Group};

/// Build the follow and group router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(list_follows).post(create_follow))
        .route("/group/", get(list_groups).post(create_group))
}

#[derive(Debug, Deserialize)]
pub struct FollowQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    #[serde(default)]
    pub following: String,
}

/// GET /api/v1/follow/
async fn list_follows(
    State(state): State<AppState>,
    Query(query): Query<FollowQuery>,
) -> Result<Json<Vec<FollowResponse>>, ApiError> {
    let follows = state.follow_service.list(query.search.as_deref()).await?;
    Ok(Json(follows.into_iter().map(FollowResponse::from).collect()))
}

/// POST /api/v1/follow/ - self and duplicate follows are rejected
async fn create_follow(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<FollowRequest>,
) -> Result<(StatusCode, Json<FollowResponse>), ApiError> {
    let follow = state.follow_service.create(&user, &body.following).await?;
    Ok((StatusCode::CREATED, Json(follow.into())))
}

/// GET /api/v1/group/
async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.group_service.list().await?))
}

/// POST /api/v1/group/
async fn create_group(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateGroupInput>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = state.group_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(group)))
}
