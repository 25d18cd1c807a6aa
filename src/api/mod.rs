//! API layer - HTTP handlers and routing
//!
//! This module contains the REST API under `/api/v1/`:
//! - JWT token endpoints
//! - Post and nested comment endpoints
//! - Follow and group endpoints
//!
//! and assembles the complete application router together with the web UI.

pub mod auth;
pub mod follow;
pub mod middleware;
pub mod posts;
pub mod responses;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::web;

pub use middleware::{ApiError, ApiJson, ApiPath, AppState, AuthenticatedUser};

/// Room for the non-file fields of a multipart post
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(posts::router())
        .merge(follow::router())
        .fallback(api_not_found)
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::authenticate,
        ))
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("Not found.")
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let body_limit = usize::try_from(state.upload_config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()).layer(cors))
        .merge(web::router(state.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
