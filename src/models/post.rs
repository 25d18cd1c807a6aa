//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post together with the author and group data every page displays.
///
/// Posts are always listed newest first.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    /// Stored image path relative to the media root
    pub image: Option<String>,
    pub author_id: i64,
    pub author_username: String,
    pub group_id: Option<i64>,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
    pub comment_count: i64,
}

impl Post {
    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|i| !i.is_empty())
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default)]
pub struct CreatePostInput {
    pub text: String,
    pub group_id: Option<i64>,
    /// Path of an already stored image
    pub image: Option<String>,
}

/// Partial update of a post; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub text: Option<String>,
    pub group_id: Option<Option<i64>>,
    pub image: Option<Option<String>>,
}

impl UpdatePostInput {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group_id.is_none() && self.image.is_none()
    }
}

/// Which posts a feed shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFilter {
    /// Every post
    All,
    /// Posts filed under a group
    Group(i64),
    /// Posts written by one author
    Author(i64),
    /// Posts by the authors a user follows
    FollowedBy(i64),
}
