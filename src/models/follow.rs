//! Follow model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription of `user` to the posts of `author`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub user_username: String,
    pub author_id: i64,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
}

/// Counters shown on a profile page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}
