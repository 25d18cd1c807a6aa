//! Server-rendered web UI
//!
//! Plain axum handlers over the services, rendered through the theme engine.
//! Every route ends with a trailing slash. Login-protected pages take the
//! [`LoginRequired`](extract::LoginRequired) extractor; failures render the
//! 404/500 templates through [`error::error_pages`].

pub mod auth;
pub mod error;
pub mod extract;
pub mod pages;
pub mod posts;

use axum::{
    handler::HandlerWithoutStateExt,
    middleware as axum_middleware,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;
use tower_http::services::ServeDir;

use crate::api::AppState;
use crate::models::User;
use crate::theme::{CurrentUser, StandardTemplateVars};

pub use error::WebError;

/// `?page=` query of every feed; kept raw so malformed values fall back to page 1
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Build the web router
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/group/{slug}/", get(pages::group_posts))
        .route("/follow/", get(pages::follow_index))
        .route("/new/", get(posts::new_post_form).post(posts::create_post))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/{username}/", get(pages::profile))
        .route("/{username}/follow/", get(posts::profile_follow))
        .route("/{username}/unfollow/", get(posts::profile_unfollow))
        .route("/{username}/{post_id}/", get(pages::post_view))
        .route(
            "/{username}/{post_id}/edit/",
            get(posts::edit_post_form).post(posts::update_post),
        )
        .route(
            "/{username}/{post_id}/comment/",
            get(posts::comment_redirect).post(posts::add_comment),
        )
        .nest_service(
            "/media",
            ServeDir::new(&state.upload_config.path).not_found_service(error::not_found.into_service()),
        )
        .fallback(error::not_found)
        .layer(axum_middleware::from_fn_with_state(state, error::error_pages))
}

/// Standard template variables for a request to `path`
pub(crate) fn page_vars(state: &AppState, path: &str) -> StandardTemplateVars {
    StandardTemplateVars::new(&state.site.name, &state.site.description, path)
}

pub(crate) fn current_user_vars(user: Option<&User>) -> Option<CurrentUser> {
    user.map(|u| CurrentUser {
        id: u.id,
        username: u.username.clone(),
        display_name: u.display_name(),
    })
}

/// Render a full page for the (possibly anonymous) user
pub(crate) fn render(
    state: &AppState,
    template: &str,
    context: &TeraContext,
    path: &str,
    user: Option<&User>,
) -> Result<Html<String>, WebError> {
    let vars = page_vars(state, path).with_user(current_user_vars(user));
    state
        .theme_engine
        .render_page(template, context, &vars)
        .map(Html)
        .map_err(WebError::Internal)
}

/// Numeric id from a path segment; anything else is a missing page
pub(crate) fn parse_id(raw: &str) -> Result<i64, WebError> {
    raw.parse().map_err(|_| WebError::NotFound)
}
