//! Comment service
//!
//! Comments hang off an existing post; only their author may edit or delete
//! them. Listing is newest first.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CreateCommentInput, User};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Post or comment does not exist
    #[error("Not found")]
    NotFound,

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { comments, posts }
    }

    pub async fn create(
        &self,
        author: &User,
        post_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        self.ensure_post(post_id).await?;
        validate_text(text)?;

        let comment = self
            .comments
            .create(&CreateCommentInput {
                post_id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await
            .context("Failed to create comment")?;

        tracing::debug!("User {} commented on post {}", author.username, post_id);
        Ok(comment)
    }

    /// A comment, provided it belongs to the given post
    pub async fn get(&self, post_id: i64, comment_id: i64) -> Result<Comment, CommentServiceError> {
        self.comments
            .get_by_id(comment_id)
            .await
            .context("Failed to get comment")?
            .filter(|c| c.post_id == post_id)
            .ok_or(CommentServiceError::NotFound)
    }

    /// Comments of a post, newest first
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        self.ensure_post(post_id).await?;
        Ok(self
            .comments
            .list_by_post(post_id)
            .await
            .context("Failed to list comments")?)
    }

    pub async fn update(
        &self,
        user: &User,
        post_id: i64,
        comment_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self.get(post_id, comment_id).await?;
        if !user.owns(comment.author_id) {
            return Err(CommentServiceError::PermissionDenied);
        }
        validate_text(text)?;

        self.comments
            .update_text(comment_id, text)
            .await
            .context("Failed to update comment")?
            .ok_or(CommentServiceError::NotFound)
    }

    pub async fn delete(
        &self,
        user: &User,
        post_id: i64,
        comment_id: i64,
    ) -> Result<(), CommentServiceError> {
        let comment = self.get(post_id, comment_id).await?;
        if !user.owns(comment.author_id) {
            return Err(CommentServiceError::PermissionDenied);
        }
        self.comments
            .delete(comment_id)
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }

    async fn ensure_post(&self, post_id: i64) -> Result<(), CommentServiceError> {
        self.posts
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .map(|_| ())
            .ok_or(CommentServiceError::NotFound)
    }
}

fn validate_text(text: &str) -> Result<(), CommentServiceError> {
    if text.trim().is_empty() {
        return Err(CommentServiceError::ValidationError(FieldErrors::single(
            "text",
            "This field is required.",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCommentRepository, SqlxPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreatePostInput, CreateUserInput};

    async fn setup() -> (CommentService, User, User, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut created = Vec::new();
        for name in ["leo", "anna"] {
            created.push(
                users
                    .create(&CreateUserInput {
                        username: name.to_string(),
                        email: String::new(),
                        password_hash: "hash".to_string(),
                        first_name: String::new(),
                        last_name: String::new(),
                    })
                    .await
                    .unwrap(),
            );
        }
        let posts = SqlxPostRepository::boxed(pool.clone());
        let post = posts
            .create(
                created[0].id,
                &CreatePostInput {
                    text: "post".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let service = CommentService::new(SqlxCommentRepository::boxed(pool), posts);
        let anna = created.pop().unwrap();
        let leo = created.pop().unwrap();
        (service, leo, anna, post.id)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (service, leo, anna, post_id) = setup().await;
        service.create(&leo, post_id, "first").await.unwrap();
        let second = service.create(&anna, post_id, "second").await.unwrap();
        assert_eq!(second.author_username, "anna");

        let listed = service.list_for_post(post_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
    }

    #[tokio::test]
    async fn test_missing_post_and_blank_text() {
        let (service, leo, _, post_id) = setup().await;
        assert!(matches!(
            service.create(&leo, 999, "hello").await,
            Err(CommentServiceError::NotFound)
        ));
        assert!(matches!(
            service.list_for_post(999).await,
            Err(CommentServiceError::NotFound)
        ));
        assert!(matches!(
            service.create(&leo, post_id, "  ").await,
            Err(CommentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_author_only_mutation() {
        let (service, leo, anna, post_id) = setup().await;
        let comment = service.create(&leo, post_id, "typo").await.unwrap();

        assert!(matches!(
            service.update(&anna, post_id, comment.id, "mine now").await,
            Err(CommentServiceError::PermissionDenied)
        ));
        assert!(matches!(
            service.delete(&anna, post_id, comment.id).await,
            Err(CommentServiceError::PermissionDenied)
        ));

        let fixed = service.update(&leo, post_id, comment.id, "fixed").await.unwrap();
        assert_eq!(fixed.text, "fixed");

        // Addressed through the wrong post
        assert!(matches!(
            service.get(post_id + 1, comment.id).await,
            Err(CommentServiceError::NotFound)
        ));

        service.delete(&leo, post_id, comment.id).await.unwrap();
        assert!(service.list_for_post(post_id).await.unwrap().is_empty());
    }
}
