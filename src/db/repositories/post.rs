//! Post repository
//!
//! Every read joins the author and the group so that feeds render without
//! further lookups. Feeds are expressed as a `FeedFilter`; the follow feed is
//! a plain set-membership filter over the `follows` table.

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::{CreatePostInput, FeedFilter, ListParams, Post};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const POST_SELECT: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.image, p.author_id,
           u.username AS author_username,
           p.group_id, g.slug AS group_slug, g.title AS group_title,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const NEWEST_FIRST: &str = "ORDER BY p.pub_date DESC, p.id DESC";

/// WHERE clause and its single bind value for a feed
fn feed_clause(filter: FeedFilter) -> (&'static str, Option<i64>) {
    match filter {
        FeedFilter::All => ("", None),
        FeedFilter::Group(id) => ("WHERE p.group_id = ?", Some(id)),
        FeedFilter::Author(id) => ("WHERE p.author_id = ?", Some(id)),
        FeedFilter::FollowedBy(user_id) => (
            "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)",
            Some(user_id),
        ),
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, author_id: i64, input: &CreatePostInput) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Overwrite the editable fields of a post
    async fn update(
        &self,
        id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Option<Post>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self, filter: FeedFilter) -> Result<i64>;

    /// One page of a feed, newest first
    async fn list(&self, filter: FeedFilter, params: &ListParams) -> Result<Vec<Post>>;

    /// A whole feed, newest first
    async fn list_all(&self, filter: FeedFilter) -> Result<Vec<Post>>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, author_id: i64, input: &CreatePostInput) -> Result<Post> {
        let now = Utc::now();
        let id = on_pool!(self.pool, db => {
            sqlx::query(
                "INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&input.text)
            .bind(now)
            .bind(author_id)
            .bind(input.group_id)
            .bind(input.image.as_deref())
            .execute(db)
            .await
            .context("Failed to create post")?
            .last_id()
        });

        self.get_by_id(id)
            .await?
            .context("Created post not found")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("{} WHERE p.id = ?", POST_SELECT);
        on_pool!(self.pool, db => {
            sqlx::query_as::<_, Post>(&sql)
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get post by ID")
        })
    }

    async fn update(
        &self,
        id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Option<Post>> {
        // MySQL reports zero affected rows for a no-op update, so existence
        // is decided by reading the row back.
        on_pool!(self.pool, db => {
            sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = ? WHERE id = ?")
                .bind(text)
                .bind(group_id)
                .bind(image)
                .bind(id)
                .execute(db)
                .await
                .context("Failed to update post")?;
        });
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, db => {
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to delete post")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count(&self, filter: FeedFilter) -> Result<i64> {
        let (clause, value) = feed_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM posts p {}", clause);
        let count: i64 = on_pool!(self.pool, db => {
            let mut query = sqlx::query_scalar::<_, i64>(&sql);
            if let Some(value) = value {
                query = query.bind(value);
            }
            query.fetch_one(db).await.context("Failed to count posts")?
        });
        Ok(count)
    }

    async fn list(&self, filter: FeedFilter, params: &ListParams) -> Result<Vec<Post>> {
        let (clause, value) = feed_clause(filter);
        let sql = format!("{} {} {} LIMIT ? OFFSET ?", POST_SELECT, clause, NEWEST_FIRST);
        on_pool!(self.pool, db => {
            let mut query = sqlx::query_as::<_, Post>(&sql);
            if let Some(value) = value {
                query = query.bind(value);
            }
            query
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(db)
                .await
                .context("Failed to list posts")
        })
    }

    async fn list_all(&self, filter: FeedFilter) -> Result<Vec<Post>> {
        let (clause, value) = feed_clause(filter);
        let sql = format!("{} {} {}", POST_SELECT, clause, NEWEST_FIRST);
        on_pool!(self.pool, db => {
            let mut query = sqlx::query_as::<_, Post>(&sql);
            if let Some(value) = value {
                query = query.bind(value);
            }
            query.fetch_all(db).await.context("Failed to list posts")
        })
    }
}
