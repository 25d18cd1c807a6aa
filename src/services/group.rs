//! Group service
//!
//! Groups are created through the API; the web UI only reads them.
//! A group without an explicit slug gets one derived from its title.

use crate::db::is_unique_violation;
use crate::db::repositories::GroupRepository;
use crate::models::{CreateGroupInput, Group, GROUP_SLUG_MAX, GROUP_TITLE_MAX};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum GroupServiceError {
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

const SLUG_TAKEN: &str = "Group with this slug already exists.";

pub struct GroupService {
    repo: Arc<dyn GroupRepository>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateGroupInput) -> Result<Group, GroupServiceError> {
        let title = input.title.trim();
        let slug = match input.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => generate_slug(title),
        };

        let mut errors = FieldErrors::new();
        if title.is_empty() {
            errors.add("title", "This field is required.");
        } else if title.chars().count() > GROUP_TITLE_MAX {
            errors.add(
                "title",
                format!("Ensure this field has no more than {} characters.", GROUP_TITLE_MAX),
            );
        }

        if slug.is_empty() {
            errors.add("slug", "This field is required.");
        } else if slug.chars().count() > GROUP_SLUG_MAX {
            errors.add(
                "slug",
                format!("Ensure this field has no more than {} characters.", GROUP_SLUG_MAX),
            );
        } else if !is_valid_slug(&slug) {
            errors.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        } else if self
            .repo
            .exists_by_slug(&slug)
            .await
            .context("Failed to check slug uniqueness")?
        {
            errors.add("slug", SLUG_TAKEN);
        }
        errors
            .into_result()
            .map_err(GroupServiceError::ValidationError)?;

        match self.repo.create(title, &slug, input.description.trim()).await {
            Ok(group) => {
                tracing::info!("Created group {} ({})", group.title, group.slug);
                Ok(group)
            }
            Err(e) if is_unique_violation(&e) => Err(GroupServiceError::ValidationError(
                FieldErrors::single("slug", SLUG_TAKEN),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>, GroupServiceError> {
        Ok(self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get group by slug")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Group>, GroupServiceError> {
        Ok(self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get group by ID")?)
    }

    /// All groups ordered by title
    pub async fn list(&self) -> Result<Vec<Group>, GroupServiceError> {
        Ok(self.repo.list().await.context("Failed to list groups")?)
    }
}

/// Derive a URL slug from a title.
///
/// Letters (including non-ASCII ones) and digits are kept lowercased, every
/// other run of characters becomes a single hyphen. The result is cut to
/// the maximum slug length.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    let slug: String = slug.chars().take(GROUP_SLUG_MAX).collect();
    slug.trim_end_matches('-').to_string()
}

fn is_valid_slug(slug: &str) -> bool {
    slug.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxGroupRepository;
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_test_service() -> GroupService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        GroupService::new(SqlxGroupRepository::boxed(pool))
    }

    fn input(title: &str, slug: Option<&str>) -> CreateGroupInput {
        CreateGroupInput {
            title: title.to_string(),
            slug: slug.map(str::to_string),
            description: String::new(),
        }
    }

    fn validation(err: GroupServiceError) -> FieldErrors {
        match err {
            GroupServiceError::ValidationError(errors) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Cats & Dogs"), "cats-dogs");
        assert_eq!(generate_slug("  Lev Tolstoy  "), "lev-tolstoy");
        assert_eq!(generate_slug("Коты"), "коты");
        assert_eq!(generate_slug("snake_case"), "snake_case");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[tokio::test]
    async fn test_create_derives_slug() {
        let service = setup_test_service().await;
        let group = service.create(input("Cat Lovers", None)).await.unwrap();
        assert_eq!(group.slug, "cat-lovers");

        let found = service.get_by_slug("cat-lovers").await.unwrap().unwrap();
        assert_eq!(found, group);
        assert_eq!(service.get_by_id(group.id).await.unwrap(), Some(group));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_slug() {
        let service = setup_test_service().await;
        service.create(input("Cats", Some("cats"))).await.unwrap();

        let errors = validation(service.create(input("Other", Some("cats"))).await.unwrap_err());
        assert_eq!(errors.get("slug"), [SLUG_TAKEN.to_string()]);
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_long_title_and_bad_slug() {
        let service = setup_test_service().await;
        let long = "x".repeat(GROUP_TITLE_MAX + 1);
        let errors = validation(service.create(input(&long, Some("ok"))).await.unwrap_err());
        assert!(errors.contains("title"));

        let errors = validation(service.create(input("Fine", Some("no spaces"))).await.unwrap_err());
        assert!(errors.contains("slug"));

        let errors = validation(service.create(input("", None)).await.unwrap_err());
        assert!(errors.contains("title"));
        assert!(errors.contains("slug"));
    }

    proptest! {
        #[test]
        fn prop_generated_slug_is_valid(title in "\\PC{0,80}") {
            let slug = generate_slug(&title);
            prop_assert!(slug.chars().count() <= GROUP_SLUG_MAX);
            prop_assert!(is_valid_slug(&slug));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
        }
    }
}
