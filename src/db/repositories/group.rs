//! Group repository

use crate::db::{DynDatabasePool, LastInsertId};
use crate::models::Group;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Insert a group; the slug must already be final
    async fn create(&self, title: &str, slug: &str, description: &str) -> Result<Group>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// All groups ordered by title
    async fn list(&self) -> Result<Vec<Group>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxGroupRepository {
    pool: DynDatabasePool,
}

impl SqlxGroupRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GroupRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GroupRepository for SqlxGroupRepository {
    async fn create(&self, title: &str, slug: &str, description: &str) -> Result<Group> {
        let id = on_pool!(self.pool, db => {
            sqlx::query("INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?)")
                .bind(title)
                .bind(slug)
                .bind(description)
                .execute(db)
                .await
                .context("Failed to create group")?
                .last_id()
        });

        Ok(Group {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        on_pool!(self.pool, db => {
            sqlx::query_as::<_, Group>(
                "SELECT id, title, slug, description FROM post_groups WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(db)
            .await
            .context("Failed to get group by ID")
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        on_pool!(self.pool, db => {
            sqlx::query_as::<_, Group>(
                "SELECT id, title, slug, description FROM post_groups WHERE slug = ?",
            )
            .bind(slug)
            .fetch_optional(db)
            .await
            .context("Failed to get group by slug")
        })
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let count: i64 = on_pool!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM post_groups WHERE slug = ?")
                .bind(slug)
                .fetch_one(db)
                .await
                .context("Failed to check group slug")?
        });
        Ok(count > 0)
    }

    async fn list(&self) -> Result<Vec<Group>> {
        on_pool!(self.pool, db => {
            sqlx::query_as::<_, Group>(
                "SELECT id, title, slug, description FROM post_groups ORDER BY title, id",
            )
            .fetch_all(db)
            .await
            .context("Failed to list groups")
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_pool!(self.pool, db => {
            sqlx::query("DELETE FROM post_groups WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to delete group")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> SqlxGroupRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxGroupRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let group = repo
            .create("Cats", "cats", "All about cats")
            .await
            .expect("Failed to create group");

        let by_slug = repo.get_by_slug("cats").await.unwrap().expect("missing");
        assert_eq!(by_slug, group);
        let by_id = repo.get_by_id(group.id).await.unwrap().expect("missing");
        assert_eq!(by_id.title, "Cats");
        assert!(repo.exists_by_slug("cats").await.unwrap());
        assert!(repo.get_by_slug("dogs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slug_unique() {
        let repo = setup_test_repo().await;
        repo.create("Cats", "cats", "").await.unwrap();
        let err = repo.create("More cats", "cats", "").await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_list_ordered_by_title() {
        let repo = setup_test_repo().await;
        repo.create("Zebras", "zebras", "").await.unwrap();
        repo.create("Ants", "ants", "").await.unwrap();

        let titles: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.title)
            .collect();
        assert_eq!(titles, vec!["Ants", "Zebras"]);
    }
}
