//! Post service
//!
//! Implements the post flows shared by the web UI and the API:
//! - validate-then-save creation and editing, with optional image upload
//! - author-only mutation
//! - the paginated feeds (index, group, profile, follow) and profile data
//!
//! Feed page selection is lenient: a missing or malformed page number means
//! the first page, and a page past the end means the last one.

use crate::db::repositories::{FollowRepository, GroupRepository, PostRepository, UserRepository};
use crate::models::{
    CreatePostInput, FeedFilter, Group, ListParams, PagedResult, Post, ProfileStats,
    UpdatePostInput, User,
};
use crate::services::image::{ImageError, ImageService, UploadedImage};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use image::ImageFormat;
use std::sync::Arc;

/// Default page size of every feed
pub const POSTS_PER_PAGE: u32 = 10;

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Not found")]
    NotFound,

    /// The requesting user is not the post's author
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A submitted post.
///
/// `group` is the raw selected value: empty means no group, anything else
/// must be the id of an existing group.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
}

/// Changes to an existing post; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub text: Option<String>,
    pub group: Option<Option<String>>,
    pub image: Option<UploadedImage>,
    /// Drop the current image when no new one is uploaded
    pub clear_image: bool,
}

impl From<PostDraft> for PostChanges {
    fn from(draft: PostDraft) -> Self {
        Self {
            text: Some(draft.text),
            group: Some(draft.group),
            image: draft.image,
            clear_image: false,
        }
    }
}

/// Everything a profile page shows
#[derive(Debug, Clone)]
pub struct Profile {
    pub author: User,
    pub posts: PagedResult<Post>,
    pub stats: ProfileStats,
    /// Whether the viewer follows the author
    pub following: bool,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    groups: Arc<dyn GroupRepository>,
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
    images: Arc<ImageService>,
    per_page: u32,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        groups: Arc<dyn GroupRepository>,
        users: Arc<dyn UserRepository>,
        follows: Arc<dyn FollowRepository>,
        images: Arc<ImageService>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            images,
            per_page: POSTS_PER_PAGE,
        }
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Validate a draft and publish it as `author`.
    ///
    /// The image is written to disk only once every field is valid.
    pub async fn create(&self, author: &User, draft: PostDraft) -> Result<Post, PostServiceError> {
        let mut errors = FieldErrors::new();
        let text = validate_text(&draft.text, &mut errors);
        let group_id = self.resolve_group(draft.group.as_deref(), &mut errors).await?;
        let image = self.check_image(draft.image.as_ref(), &mut errors);
        errors
            .into_result()
            .map_err(PostServiceError::ValidationError)?;

        let image = match image {
            Some((upload, format)) => Some(self.store(upload, format).await?),
            None => None,
        };

        let post = self
            .posts
            .create(
                author.id,
                &CreatePostInput {
                    text,
                    group_id,
                    image,
                },
            )
            .await
            .context("Failed to create post")?;

        tracing::info!("User {} published post {}", author.username, post.id);
        Ok(post)
    }

    /// Apply changes to a post the user authored
    pub async fn update(
        &self,
        user: &User,
        post_id: i64,
        changes: PostChanges,
    ) -> Result<Post, PostServiceError> {
        let post = self.get(post_id).await?;
        if !user.owns(post.author_id) {
            return Err(PostServiceError::PermissionDenied);
        }

        let mut errors = FieldErrors::new();
        let mut update = UpdatePostInput::default();
        if let Some(text) = changes.text.as_deref() {
            update.text = Some(validate_text(text, &mut errors));
        }
        if let Some(group) = changes.group.as_ref() {
            update.group_id = Some(self.resolve_group(group.as_deref(), &mut errors).await?);
        }
        let image = self.check_image(changes.image.as_ref(), &mut errors);
        errors
            .into_result()
            .map_err(PostServiceError::ValidationError)?;

        if let Some((upload, format)) = image {
            update.image = Some(Some(self.store(upload, format).await?));
        } else if changes.clear_image {
            update.image = Some(None);
        }

        if update.is_empty() {
            return Ok(post);
        }

        let text = update.text.unwrap_or(post.text);
        let group_id = update.group_id.unwrap_or(post.group_id);
        let image = update.image.unwrap_or(post.image);
        let updated = self
            .posts
            .update(post_id, &text, group_id, image.as_deref())
            .await
            .context("Failed to update post")?
            .ok_or(PostServiceError::NotFound)?;

        tracing::info!("User {} edited post {}", user.username, post_id);
        Ok(updated)
    }

    pub async fn delete(&self, user: &User, post_id: i64) -> Result<(), PostServiceError> {
        let post = self.get(post_id).await?;
        if !user.owns(post.author_id) {
            return Err(PostServiceError::PermissionDenied);
        }
        self.posts
            .delete(post_id)
            .await
            .context("Failed to delete post")?;
        tracing::info!("User {} deleted post {}", user.username, post_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get(&self, post_id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    /// A post addressed through its author's username
    pub async fn get_by_author(&self, username: &str, post_id: i64) -> Result<Post, PostServiceError> {
        let post = self.get(post_id).await?;
        if post.author_username != username {
            return Err(PostServiceError::NotFound);
        }
        Ok(post)
    }

    pub async fn index(&self, page: Option<&str>) -> Result<PagedResult<Post>, PostServiceError> {
        self.feed(FeedFilter::All, page).await
    }

    pub async fn group_feed(
        &self,
        slug: &str,
        page: Option<&str>,
    ) -> Result<(Group, PagedResult<Post>), PostServiceError> {
        let group = self
            .groups
            .get_by_slug(slug)
            .await
            .context("Failed to get group")?
            .ok_or(PostServiceError::NotFound)?;
        let posts = self.feed(FeedFilter::Group(group.id), page).await?;
        Ok((group, posts))
    }

    /// Posts by the authors `user` follows
    pub async fn follow_feed(
        &self,
        user: &User,
        page: Option<&str>,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        self.feed(FeedFilter::FollowedBy(user.id), page).await
    }

    pub async fn profile(
        &self,
        username: &str,
        page: Option<&str>,
        viewer: Option<&User>,
    ) -> Result<Profile, PostServiceError> {
        let author = self
            .users
            .get_by_username(username)
            .await
            .context("Failed to get user")?
            .ok_or(PostServiceError::NotFound)?;

        let posts = self.feed(FeedFilter::Author(author.id), page).await?;
        let stats = ProfileStats {
            posts_count: posts.total,
            followers_count: self
                .follows
                .count_followers(author.id)
                .await
                .context("Failed to count followers")?,
            following_count: self
                .follows
                .count_following(author.id)
                .await
                .context("Failed to count following")?,
        };
        let following = match viewer {
            Some(viewer) if viewer.id != author.id => self
                .follows
                .get(viewer.id, author.id)
                .await
                .context("Failed to check follow")?
                .is_some(),
            _ => false,
        };

        Ok(Profile {
            author,
            posts,
            stats,
            following,
        })
    }

    /// Unpaginated list for the API, optionally restricted to one group
    pub async fn list(&self, group_id: Option<i64>) -> Result<Vec<Post>, PostServiceError> {
        let filter = group_id.map_or(FeedFilter::All, FeedFilter::Group);
        Ok(self
            .posts
            .list_all(filter)
            .await
            .context("Failed to list posts")?)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn feed(
        &self,
        filter: FeedFilter,
        page: Option<&str>,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let total = self
            .posts
            .count(filter)
            .await
            .context("Failed to count posts")?;
        let params = ListParams::from_query(page, self.per_page).clamp_to(total);
        let items = self
            .posts
            .list(filter, &params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    async fn resolve_group(
        &self,
        raw: Option<&str>,
        errors: &mut FieldErrors,
    ) -> Result<Option<i64>, PostServiceError> {
        let raw = raw.map(str::trim).unwrap_or("");
        if raw.is_empty() {
            return Ok(None);
        }
        let Ok(id) = raw.parse::<i64>() else {
            errors.add("group", INVALID_CHOICE);
            return Ok(None);
        };
        let group = self
            .groups
            .get_by_id(id)
            .await
            .context("Failed to get group")?;
        if group.is_none() {
            errors.add("group", INVALID_CHOICE);
        }
        Ok(group.map(|g| g.id))
    }

    fn check_image<'a>(
        &self,
        upload: Option<&'a UploadedImage>,
        errors: &mut FieldErrors,
    ) -> Option<(&'a UploadedImage, ImageFormat)> {
        let upload = upload?;
        match self.images.validate_image(&upload.data) {
            Ok(format) => Some((upload, format)),
            Err(e) => {
                errors.add_with_code("image", e.code(), e.to_string());
                None
            }
        }
    }

    async fn store(&self, upload: &UploadedImage, format: ImageFormat) -> Result<String, PostServiceError> {
        self.images
            .store_image(&upload.data, format)
            .await
            .map_err(|e| match e {
                ImageError::InternalError(e) => PostServiceError::InternalError(e),
                other => PostServiceError::ValidationError(FieldErrors::single("image", other.to_string())),
            })
    }
}

fn validate_text(text: &str, errors: &mut FieldErrors) -> String {
    if text.trim().is_empty() {
        errors.add("text", REQUIRED);
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::db::repositories::{
        SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreateUserInput;
    use crate::services::image::tests::png_bytes;
    use crate::services::image::INVALID_IMAGE;
    use tempfile::TempDir;

    struct Fixture {
        service: PostService,
        users: Arc<dyn UserRepository>,
        groups: Arc<dyn GroupRepository>,
        follows: Arc<dyn FollowRepository>,
        media: TempDir,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let media = TempDir::new().unwrap();
        let users = SqlxUserRepository::boxed(pool.clone());
        let groups = SqlxGroupRepository::boxed(pool.clone());
        let follows = SqlxFollowRepository::boxed(pool.clone());
        let images = Arc::new(ImageService::new(UploadConfig {
            path: media.path().to_path_buf(),
            ..Default::default()
        }));
        let service = PostService::new(
            SqlxPostRepository::boxed(pool),
            groups.clone(),
            users.clone(),
            follows.clone(),
            images,
        );
        Fixture {
            service,
            users,
            groups,
            follows,
            media,
        }
    }

    async fn user(fx: &Fixture, username: &str) -> User {
        fx.users
            .create(&CreateUserInput {
                username: username.to_string(),
                email: String::new(),
                password_hash: "hash".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .unwrap()
    }

    fn draft(text: &str) -> PostDraft {
        PostDraft {
            text: text.to_string(),
            ..Default::default()
        }
    }

    fn validation(err: PostServiceError) -> FieldErrors {
        match err {
            PostServiceError::ValidationError(errors) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_with_group_and_image() {
        let fx = setup().await;
        let leo = user(&fx, "leo").await;
        let group = fx.groups.create("Cats", "cats", "").await.unwrap();

        let post = fx
            .service
            .create(
                &leo,
                PostDraft {
                    text: "a cat".to_string(),
                    group: Some(group.id.to_string()),
                    image: Some(UploadedImage {
                        file_name: Some("cat.png".to_string()),
                        data: png_bytes(),
                    }),
                },
            )
            .await
            .expect("Failed to create post");

        assert_eq!(post.group_slug.as_deref(), Some("cats"));
        let image = post.image.expect("image path");
        assert!(fx.media.path().join(image).exists());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = setup().await;
        let leo = user(&fx, "leo").await;

        let errors = validation(fx.service.create(&leo, draft("   ")).await.unwrap_err());
        assert_eq!(errors.get("text"), [REQUIRED.to_string()]);

        let mut bad = draft("text");
        bad.group = Some("999".to_string());
        bad.image = Some(UploadedImage {
            file_name: Some("notes.txt".to_string()),
            data: b"not an image".to_vec(),
        });
        let errors = validation(fx.service.create(&leo, bad).await.unwrap_err());
        assert!(errors.contains("group"));
        assert_eq!(errors.first_code(), Some(INVALID_IMAGE));

        assert_eq!(fx.service.index(None).await.unwrap().total, 0);
        assert!(!fx.media.path().join("posts").exists());
    }

    #[tokio::test]
    async fn test_update_is_author_only_and_keeps_image() {
        let fx = setup().await;
        let leo = user(&fx, "leo").await;
        let anna = user(&fx, "anna").await;
        let mut with_image = draft("original");
        with_image.image = Some(UploadedImage {
            file_name: None,
            data: png_bytes(),
        });
        let post = fx.service.create(&leo, with_image).await.unwrap();

        let changes = PostChanges {
            text: Some("hijacked".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.update(&anna, post.id, changes.clone()).await,
            Err(PostServiceError::PermissionDenied)
        ));
        assert!(matches!(
            fx.service.delete(&anna, post.id).await,
            Err(PostServiceError::PermissionDenied)
        ));

        let edited = fx
            .service
            .update(&leo, post.id, draft("edited").into())
            .await
            .unwrap();
        assert_eq!(edited.text, "edited");
        assert_eq!(edited.image, post.image);

        let cleared = fx
            .service
            .update(
                &leo,
                post.id,
                PostChanges {
                    clear_image: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!cleared.has_image());
    }

    #[tokio::test]
    async fn test_update_rejects_bad_image() {
        let fx = setup().await;
        let leo = user(&fx, "leo").await;
        let post = fx.service.create(&leo, draft("text")).await.unwrap();

        let mut changes: PostChanges = draft("text").into();
        changes.image = Some(UploadedImage {
            file_name: Some("x.png".to_string()),
            data: b"GIF89a broken".to_vec(),
        });
        let errors = validation(fx.service.update(&leo, post.id, changes).await.unwrap_err());
        assert_eq!(errors.first_code(), Some(INVALID_IMAGE));
    }

    #[tokio::test]
    async fn test_feeds_and_lenient_paging() {
        let fx = setup().await;
        let leo = user(&fx, "leo").await;
        for i in 0..13 {
            fx.service.create(&leo, draft(&format!("post {}", i))).await.unwrap();
        }

        let first = fx.service.index(None).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.items[0].text, "post 12");

        let second = fx.service.index(Some("2")).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(fx.service.index(Some("99")).await.unwrap().page, 2);
        assert_eq!(fx.service.index(Some("abc")).await.unwrap().page, 1);

        assert!(matches!(
            fx.service.group_feed("missing", None).await,
            Err(PostServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_profile_and_follow_feed() {
        let fx = setup().await;
        let leo = user(&fx, "leo").await;
        let reader = user(&fx, "reader").await;
        let post = fx.service.create(&leo, draft("by leo")).await.unwrap();

        assert_eq!(fx.service.follow_feed(&reader, None).await.unwrap().total, 0);
        fx.follows.create(reader.id, leo.id).await.unwrap();

        let feed = fx.service.follow_feed(&reader, None).await.unwrap();
        assert_eq!(feed.items[0].id, post.id);

        let profile = fx.service.profile("leo", None, Some(&reader)).await.unwrap();
        assert_eq!(profile.stats.posts_count, 1);
        assert_eq!(profile.stats.followers_count, 1);
        assert_eq!(profile.stats.following_count, 0);
        assert!(profile.following);
        assert!(!fx.service.profile("leo", None, None).await.unwrap().following);

        assert!(matches!(
            fx.service.profile("ghost", None, None).await,
            Err(PostServiceError::NotFound)
        ));
        assert!(matches!(
            fx.service.get_by_author("reader", post.id).await,
            Err(PostServiceError::NotFound)
        ));
    }
}
