//! Follow repository
//!
//! The (user_id, author_id) pair is unique at the schema level; a second
//! insert of the same pair surfaces as a unique-constraint error.

use crate::db::DynDatabasePool;
use crate::models::Follow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const FOLLOW_SELECT: &str = r#"
    SELECT f.id, f.user_id, fu.username AS user_username,
           f.author_id, fa.username AS author_username, f.created_at
    FROM follows f
    JOIN users fu ON fu.id = f.user_id
    JOIN users fa ON fa.id = f.author_id
"#;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    async fn create(&self, user_id: i64, author_id: i64) -> Result<Follow>;

    async fn get(&self, user_id: i64, author_id: i64) -> Result<Option<Follow>>;

    /// Delete the pair, returning whether it existed
    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// All follows, optionally restricted to those where either side has
    /// exactly the given username
    async fn list(&self, username: Option<&str>) -> Result<Vec<Follow>>;

    async fn count_followers(&self, author_id: i64) -> Result<i64>;

    async fn count_following(&self, user_id: i64) -> Result<i64>;
}

pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }

    async fn count_where(&self, column: &str, id: i64) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM follows WHERE {} = ?", column);
        let count = on_pool!(self.pool, db => {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(id)
                .fetch_one(db)
                .await
                .context("Failed to count follows")?
        });
        Ok(count)
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn create(&self, user_id: i64, author_id: i64) -> Result<Follow> {
        let now = Utc::now();
        on_pool!(self.pool, db => {
            sqlx::query("INSERT INTO follows (user_id, author_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(author_id)
                .bind(now)
                .execute(db)
                .await
                .context("Failed to create follow")?;
        });

        self.get(user_id, author_id)
            .await?
            .context("Created follow not found")
    }

    async fn get(&self, user_id: i64, author_id: i64) -> Result<Option<Follow>> {
        let sql = format!("{} WHERE f.user_id = ? AND f.author_id = ?", FOLLOW_SELECT);
        on_pool!(self.pool, db => {
            sqlx::query_as::<_, Follow>(&sql)
                .bind(user_id)
                .bind(author_id)
                .fetch_optional(db)
                .await
                .context("Failed to get follow")
        })
    }

    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, db => {
            sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
                .bind(user_id)
                .bind(author_id)
                .execute(db)
                .await
                .context("Failed to delete follow")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, username: Option<&str>) -> Result<Vec<Follow>> {
        match username {
            Some(username) => {
                let sql = format!(
                    "{} WHERE fu.username = ? OR fa.username = ? ORDER BY f.id",
                    FOLLOW_SELECT
                );
                on_pool!(self.pool, db => {
                    sqlx::query_as::<_, Follow>(&sql)
                        .bind(username)
                        .bind(username)
                        .fetch_all(db)
                        .await
                        .context("Failed to search follows")
                })
            }
            None => {
                let sql = format!("{} ORDER BY f.id", FOLLOW_SELECT);
                on_pool!(self.pool, db => {
                    sqlx::query_as::<_, Follow>(&sql)
                        .fetch_all(db)
                        .await
                        .context("Failed to list follows")
                })
            }
        }
    }

    async fn count_followers(&self, author_id: i64) -> Result<i64> {
        self.count_where("author_id", author_id).await
    }

    async fn count_following(&self, user_id: i64) -> Result<i64> {
        self.count_where("user_id", user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, is_unique_violation, migrations};
    use crate::models::CreateUserInput;

    async fn setup(usernames: &[&str]) -> (SqlxFollowRepository, Vec<i64>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in usernames {
            let user = users
                .create(&CreateUserInput {
                    username: name.to_string(),
                    email: String::new(),
                    password_hash: "hash".to_string(),
                    first_name: String::new(),
                    last_name: String::new(),
                })
                .await
                .unwrap();
            ids.push(user.id);
        }
        (SqlxFollowRepository::new(pool), ids)
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let (repo, ids) = setup(&["reader", "leo"]).await;
        let follow = repo.create(ids[0], ids[1]).await.expect("Failed to follow");
        assert_eq!(follow.user_username, "reader");
        assert_eq!(follow.author_username, "leo");

        assert!(repo.get(ids[0], ids[1]).await.unwrap().is_some());
        assert!(repo.get(ids[1], ids[0]).await.unwrap().is_none());

        assert!(repo.delete(ids[0], ids[1]).await.unwrap());
        assert!(!repo.delete(ids[0], ids[1]).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected() {
        let (repo, ids) = setup(&["reader", "leo"]).await;
        repo.create(ids[0], ids[1]).await.unwrap();

        let err = repo.create(ids[0], ids[1]).await.unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(repo.count_followers(ids[1]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_and_counts() {
        let (repo, ids) = setup(&["reader", "leo", "anna"]).await;
        repo.create(ids[0], ids[1]).await.unwrap();
        repo.create(ids[0], ids[2]).await.unwrap();
        repo.create(ids[2], ids[1]).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 3);
        assert_eq!(repo.list(Some("leo")).await.unwrap().len(), 2);
        assert_eq!(repo.list(Some("anna")).await.unwrap().len(), 2);
        assert_eq!(repo.list(Some("le")).await.unwrap().len(), 0);

        assert_eq!(repo.count_followers(ids[1]).await.unwrap(), 2);
        assert_eq!(repo.count_following(ids[0]).await.unwrap(), 2);
        assert_eq!(repo.count_following(ids[1]).await.unwrap(), 0);
    }
}
