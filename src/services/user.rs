//! User service
//!
//! Registration, credential checks and web sessions:
//! - signup with password confirmation and strength checks
//! - login creating a session row referenced by the `session` cookie
//! - logout deleting that row
//! - session validation, dropping sessions found expired

use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{check_password_strength, hash_password, verify_password};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

const USERNAME_MAX: usize = 150;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Invalid signup input
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for signup
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            password_confirm: password.clone(),
            password,
            ..Default::default()
        }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Register a new user.
    ///
    /// All field problems are reported together. A username taken between
    /// the existence check and the insert is reported the same way as one
    /// taken before it.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let mut errors = validate_register_input(&input, &username)?;

        if !errors.contains("username")
            && self
                .user_repo
                .exists_by_username(&username)
                .await
                .context("Failed to check username")?
        {
            errors.add("username", USERNAME_TAKEN);
        }
        errors
            .into_result()
            .map_err(UserServiceError::ValidationError)?;

        let password_hash = hash_password(&input.password)?;
        let created = self
            .user_repo
            .create(&CreateUserInput {
                username,
                email: input.email.trim().to_string(),
                password_hash,
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
            })
            .await;

        match created {
            Ok(user) => {
                tracing::info!("Registered user {} (id {})", user.username, user.id);
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::ValidationError(
                FieldErrors::single("username", USERNAME_TAKEN),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Check a username/password pair
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, UserServiceError> {
        let invalid = || {
            UserServiceError::AuthenticationError(
                "Please enter a correct username and password.".to_string(),
            )
        };

        let user = self
            .user_repo
            .get_by_username(username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!("Rejected password for {}", user.username);
            return Err(invalid());
        }
        Ok(user)
    }

    /// Check credentials and open a web session
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, Session), UserServiceError> {
        let user = self.authenticate(username, password).await?;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::debug!("User {} logged in", user.username);
        Ok((user, session))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// User behind a session id, or `None` for unknown and expired sessions
    pub async fn validate_session(&self, session_id: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(session_id)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            let removed = self
                .session_repo
                .delete_expired()
                .await
                .context("Failed to delete expired sessions")?;
            tracing::debug!("Removed {} expired sessions", removed);
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }
}

const USERNAME_TAKEN: &str = "A user with that username already exists.";

fn validate_register_input(input: &RegisterInput, username: &str) -> anyhow::Result<FieldErrors> {
    let username_re = Regex::new(r"^[\w.@+-]+$").context("Invalid username pattern")?;
    let mut errors = FieldErrors::new();

    if username.is_empty() {
        errors.add("username", "This field is required.");
    } else if username.chars().count() > USERNAME_MAX {
        errors.add(
            "username",
            format!("Ensure this value has at most {} characters.", USERNAME_MAX),
        );
    } else if !username_re.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    let email = input.email.trim();
    if !email.is_empty() && !is_plausible_email(email) {
        errors.add("email", "Enter a valid email address.");
    }

    if input.password.is_empty() {
        errors.add("password", "This field is required.");
    } else {
        for problem in check_password_strength(&input.password, username) {
            errors.add("password", problem);
        }
    }
    if input.password != input.password_confirm {
        errors.add("password_confirm", "The two password fields didn't match.");
    }

    Ok(errors)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
