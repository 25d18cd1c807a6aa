//! Comment repository

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{Comment, CreateCommentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of a post, newest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>>;

    async fn update_text(&self, id: i64, text: &str) -> Result<Option<Comment>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        let now = Utc::now();
        let id = on_pool!(self.pool, db => {
            sqlx::query("INSERT INTO comments (post_id, author_id, text, created) VALUES (?, ?, ?, ?)")
                .bind(input.post_id)
                .bind(input.author_id)
                .bind(&input.text)
                .bind(now)
                .execute(db)
                .await
                .context("Failed to create comment")?
                .last_id()
        });

        self.get_by_id(id)
            .await?
            .context("Created comment not found")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE c.id = ?", COMMENT_SELECT);
        on_pool!(self.pool, db => {
            sqlx::query_as::<_, Comment>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get comment by ID")
        })
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "{} WHERE c.post_id = ? ORDER BY c.created DESC, c.id DESC",
            COMMENT_SELECT
        );
        on_pool!(self.pool, db => {
            sqlx::query_as::<_, Comment>(&sql)
                .bind(post_id)
                .fetch_all(db)
                .await
                .context("Failed to list comments")
        })
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<Option<Comment>> {
        on_pool!(self.pool, db => {
            sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
                .bind(text)
                .bind(id)
                .execute(db)
                .await
                .context("Failed to update comment")?;
        });
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, db => {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to delete comment")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}
