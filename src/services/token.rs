//! API token service
//!
//! Issues HS256 access/refresh pairs and verifies them. Both kinds carry a
//! `token_type` claim so a refresh token is never accepted as an access
//! token and vice versa.

use crate::config::AuthConfig;
use crate::models::User;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    pub token_type: TokenType,
    /// Issued at (unix timestamp)
    pub iat: i64,
    /// Expiration (unix timestamp)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenServiceError {
    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("Token has wrong type")]
    WrongTokenType,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl_seconds,
            config.refresh_token_ttl_seconds,
        )
    }

    /// Issue a fresh access/refresh pair for a user
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenServiceError> {
        Ok(TokenPair {
            access: self.issue(user.id, &user.username, TokenType::Access)?,
            refresh: self.issue(user.id, &user.username, TokenType::Refresh)?,
        })
    }

    /// Exchange a refresh token for a new access token
    pub fn refresh(&self, refresh_token: &str) -> Result<String, TokenServiceError> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        self.issue(claims.sub, &claims.username, TokenType::Access)
    }

    /// Claims of a valid access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenServiceError> {
        self.verify(token, TokenType::Access)
    }

    fn issue(&self, user_id: i64, username: &str, token_type: TokenType) -> Result<String, TokenServiceError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_seconds,
            TokenType::Refresh => self.refresh_ttl_seconds,
        };
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            token_type,
            iat: now,
            exp: now + ttl,
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e).into())
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenServiceError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected token: {}", e);
                TokenServiceError::InvalidToken
            })?;
        if claims.token_type != expected {
            return Err(TokenServiceError::WrongTokenType);
        }
        Ok(claims)
    }
}
