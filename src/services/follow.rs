//! Follow service
//!
//! Two flavours of "follow":
//! - the web toggle, which is idempotent and silently ignores self-follows
//! - the API create, which rejects duplicates and self-follows as invalid

use crate::db::is_unique_violation;
use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::{Follow, User};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FollowServiceError {
    /// Target user does not exist
    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

const ALREADY_FOLLOWING: &str = "You are already following this author.";
const CANNOT_FOLLOW_SELF: &str = "You cannot follow yourself.";

pub struct FollowService {
    follows: Arc<dyn FollowRepository>,
    users: Arc<dyn UserRepository>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { follows, users }
    }

    /// Get or create the follow; following yourself is a no-op
    pub async fn follow(&self, user: &User, author_username: &str) -> Result<User, FollowServiceError> {
        let author = self.author(author_username).await?;
        if author.id == user.id {
            return Ok(author);
        }

        let existing = self
            .follows
            .get(user.id, author.id)
            .await
            .context("Failed to check follow")?;
        if existing.is_none() {
            match self.follows.create(user.id, author.id).await {
                Ok(_) => tracing::info!("{} now follows {}", user.username, author.username),
                // Lost a race with a concurrent identical request
                Err(e) if is_unique_violation(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(author)
    }

    /// Remove the follow if present
    pub async fn unfollow(&self, user: &User, author_username: &str) -> Result<User, FollowServiceError> {
        let author = self.author(author_username).await?;
        if self
            .follows
            .delete(user.id, author.id)
            .await
            .context("Failed to delete follow")?
        {
            tracing::info!("{} unfollowed {}", user.username, author.username);
        }
        Ok(author)
    }

    pub async fn is_following(&self, user: &User, author: &User) -> Result<bool, FollowServiceError> {
        Ok(self
            .follows
            .get(user.id, author.id)
            .await
            .context("Failed to check follow")?
            .is_some())
    }

    /// Strict create: unknown, self and duplicate targets are validation errors
    pub async fn create(&self, user: &User, following: &str) -> Result<Follow, FollowServiceError> {
        let following = following.trim();
        if following.is_empty() {
            return Err(invalid("This field is required."));
        }
        let Some(author) = self
            .users
            .get_by_username(following)
            .await
            .context("Failed to get user")?
        else {
            return Err(invalid(format!(
                "Object with username={} does not exist.",
                following
            )));
        };
        if author.id == user.id {
            return Err(invalid(CANNOT_FOLLOW_SELF));
        }
        if self
            .follows
            .get(user.id, author.id)
            .await
            .context("Failed to check follow")?
            .is_some()
        {
            return Err(invalid(ALREADY_FOLLOWING));
        }

        match self.follows.create(user.id, author.id).await {
            Ok(follow) => Ok(follow),
            Err(e) if is_unique_violation(&e) => Err(invalid(ALREADY_FOLLOWING)),
            Err(e) => Err(e.into()),
        }
    }

    /// All follows, or those where either side is exactly `search`
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Follow>, FollowServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self
            .follows
            .list(search)
            .await
            .context("Failed to list follows")?)
    }

    async fn author(&self, username: &str) -> Result<User, FollowServiceError> {
        self.users
            .get_by_username(username)
            .await
            .context("Failed to get user")?
            .ok_or(FollowServiceError::UserNotFound)
    }
}

fn invalid(message: impl Into<String>) -> FollowServiceError {
    FollowServiceError::ValidationError(FieldErrors::single("following", message))
}
