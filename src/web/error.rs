//! Web error pages
//!
//! Handlers fail with [`WebError`]. Its response only carries the status and
//! an [`ErrorPage`] marker; the [`error_pages`] middleware, which has the
//! application state, renders `404.html` or `500.html` in its place.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::services::{
    CommentServiceError, FollowServiceError, GroupServiceError, PostServiceError, UserServiceError,
};
use crate::web::extract::session_id;
use crate::web::{current_user_vars, page_vars};

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Which error template a response should be rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPage {
    NotFound,
    ServerError,
}

impl ErrorPage {
    fn template(self) -> &'static str {
        match self {
            ErrorPage::NotFound => "404.html",
            ErrorPage::ServerError => "500.html",
        }
    }

    fn status(self) -> StatusCode {
        match self {
            ErrorPage::NotFound => StatusCode::NOT_FOUND,
            ErrorPage::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let page = match self {
            WebError::NotFound => ErrorPage::NotFound,
            WebError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                ErrorPage::ServerError
            }
        };
        let mut response = page.status().into_response();
        response.extensions_mut().insert(page);
        response
    }
}

macro_rules! not_found_or_internal {
    ($($error:ident :: $not_found:ident),* $(,)?) => {
        $(
            impl From<$error> for WebError {
                fn from(err: $error) -> Self {
                    match err {
                        $error::$not_found => WebError::NotFound,
                        other => WebError::Internal(other.into()),
                    }
                }
            }
        )*
    };
}

not_found_or_internal!(
    PostServiceError::NotFound,
    CommentServiceError::NotFound,
    FollowServiceError::UserNotFound,
);

impl From<UserServiceError> for WebError {
    fn from(err: UserServiceError) -> Self {
        WebError::Internal(err.into())
    }
}

impl From<GroupServiceError> for WebError {
    fn from(err: GroupServiceError) -> Self {
        WebError::Internal(err.into())
    }
}

/// Replace marked error responses with the rendered error page
pub async fn error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let session = session_id(request.headers());

    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let user = match session {
        Some(id) => state.user_service.validate_session(&id).await.ok().flatten(),
        None => None,
    };
    let vars = page_vars(&state, &path).with_user(current_user_vars(user.as_ref()));
    let html = state
        .theme_engine
        .render_with_fallback(page.template(), &TeraContext::new(), &vars);
    (page.status(), Html(html)).into_response()
}

/// Fallback for unknown paths
pub async fn not_found() -> WebError {
    WebError::NotFound
}
