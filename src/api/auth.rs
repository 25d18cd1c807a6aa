//! Token endpoints
//!
//! - POST /api/v1/token/ - exchange credentials for an access/refresh pair
//! - POST /api/v1/token/refresh/ - exchange a refresh token for a new access token

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::services::{FieldErrors, TokenPair};

#[derive(Debug, Deserialize)]
pub struct TokenObtainRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

/// Build the token router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/token/", post(obtain_token))
        .route("/token/refresh/", post(refresh_token))
}

fn require(fields: &[(&str, &str)]) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    for (name, value) in fields {
        if value.is_empty() {
            errors.add(name, "This field is required.");
        }
    }
    errors.into_result().map_err(ApiError::fields)
}

/// POST /api/v1/token/
async fn obtain_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenObtainRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    require(&[("username", &body.username), ("password", &body.password)])?;

    let user = state
        .user_service
        .authenticate(&body.username, &body.password)
        .await?;
    let pair = state.token_service.issue_pair(&user)?;
    tracing::debug!("Issued API tokens for {}", user.username);
    Ok(Json(pair))
}

/// POST /api/v1/token/refresh/
async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenRefreshRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    require(&[("refresh", &body.refresh)])?;

    let access = state.token_service.refresh(&body.refresh)?;
    Ok(Json(AccessTokenResponse { access }))
}
