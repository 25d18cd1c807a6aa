//! API middleware
//!
//! Contains:
//! - the application state shared by the API and the web UI
//! - the JSON error body every API failure uses
//! - bearer-token authentication

use anyhow::Result;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request, State,
    },
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{create_cache, MemoryCache};
use crate::config::{Config, SiteConfig, UploadConfig};
use crate::db::repositories::{
    SqlxCommentRepository, SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CommentService, CommentServiceError, FieldErrors, FollowService, FollowServiceError,
    GroupService, GroupServiceError, ImageService, PostService, PostServiceError, TokenService,
    TokenServiceError, UserService, UserServiceError,
};
use crate::theme::ThemeEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub token_service: Arc<TokenService>,
    pub group_service: Arc<GroupService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub follow_service: Arc<FollowService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub cache: Arc<MemoryCache>,
    pub upload_config: Arc<UploadConfig>,
    pub site: Arc<SiteConfig>,
    /// Lifetime of cached template fragments
    pub fragment_ttl: Duration,
}

impl AppState {
    /// Wire repositories, services, cache and templates over `pool`
    pub fn new(pool: DynDatabasePool, config: &Config) -> Result<Self> {
        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let groups = SqlxGroupRepository::boxed(pool.clone());
        let posts = SqlxPostRepository::boxed(pool.clone());
        let comments = SqlxCommentRepository::boxed(pool.clone());
        let follows = SqlxFollowRepository::boxed(pool.clone());

        let images = Arc::new(ImageService::new(config.upload.clone()));

        let user_service = Arc::new(UserService::with_session_expiration(
            users.clone(),
            sessions,
            config.auth.session_days,
        ));
        let post_service = Arc::new(
            PostService::new(
                posts.clone(),
                groups.clone(),
                users.clone(),
                follows.clone(),
                images,
            )
            .with_per_page(config.site.posts_per_page),
        );

        Ok(Self {
            pool,
            user_service,
            token_service: Arc::new(TokenService::from_config(&config.auth)),
            group_service: Arc::new(GroupService::new(groups)),
            post_service,
            comment_service: Arc::new(CommentService::new(comments, posts)),
            follow_service: Arc::new(FollowService::new(follows, users)),
            theme_engine: Arc::new(ThemeEngine::new(config.theme.path.as_deref())?),
            cache: create_cache(&config.cache)?,
            upload_config: Arc::new(config.upload.clone()),
            site: Arc::new(config.site.clone()),
            fragment_ttl: Duration::from_secs(config.cache.fragment_ttl_seconds),
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))
    }
}

/// JSON body whose rejections answer with an [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters; an id that does not parse is a missing object
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Error response for API errors
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
    #[serde(skip)]
    status: StatusCode,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            status,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// 400 carrying per-field messages as `details`.
    ///
    /// A coded error (such as `invalid_image`) replaces the generic code.
    pub fn fields(errors: FieldErrors) -> Self {
        let code = errors.first_code().unwrap_or("VALIDATION_ERROR").to_string();
        let details = serde_json::to_value(&errors).unwrap_or_default();
        Self::new(StatusCode::BAD_REQUEST, code, errors.to_string()).with_details(details)
    }

    /// 500; the cause is logged, not returned
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound => ApiError::not_found("Not found."),
            PostServiceError::PermissionDenied => ApiError::forbidden(err.to_string()),
            PostServiceError::ValidationError(errors) => ApiError::fields(errors),
            PostServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound => ApiError::not_found("Not found."),
            CommentServiceError::PermissionDenied => ApiError::forbidden(err.to_string()),
            CommentServiceError::ValidationError(errors) => ApiError::fields(errors),
            CommentServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<FollowServiceError> for ApiError {
    fn from(err: FollowServiceError) -> Self {
        match err {
            FollowServiceError::UserNotFound => ApiError::not_found("Not found."),
            FollowServiceError::ValidationError(errors) => ApiError::fields(errors),
            FollowServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<GroupServiceError> for ApiError {
    fn from(err: GroupServiceError) -> Self {
        match err {
            GroupServiceError::ValidationError(errors) => ApiError::fields(errors),
            GroupServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(errors) => ApiError::fields(errors),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<TokenServiceError> for ApiError {
    fn from(err: TokenServiceError) -> Self {
        match err {
            TokenServiceError::InternalError(e) => ApiError::internal_error(e),
            _ => ApiError::unauthorized("Token is invalid or expired"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("Unmatched path parameters: {}", rejection.body_text());
        ApiError::not_found("Not found.")
    }
}

/// Extract the bearer token from the `Authorization` header
fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Authentication middleware for the API.
///
/// A request without a token passes through anonymously; handlers that
/// write ask for [`AuthenticatedUser`]. A token that is present but invalid
/// is rejected outright.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer_token(&request) else {
        return Ok(next.run(request).await);
    };

    let claims = state.token_service.verify_access(token)?;
    let user = state
        .user_service
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request<Body> {
        Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&request_with_auth("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(&request_with_auth("Basic abc")), None);
        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_bearer_token(&bare), None);
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::internal_error("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_field_errors_become_details() {
        let mut errors = FieldErrors::new();
        errors.add_with_code("image", "invalid_image", "Upload a valid image.");
        let err = ApiError::fields(errors);

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error.code, "invalid_image");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"]["details"]["image"][0], "Upload a valid image.");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_permission_denied_maps_to_403() {
        let err: ApiError = PostServiceError::PermissionDenied.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err: ApiError = TokenServiceError::WrongTokenType.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
