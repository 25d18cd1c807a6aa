//! Group model

use serde::{Deserialize, Serialize};

/// Maximum title length
pub const GROUP_TITLE_MAX: usize = 200;
/// Maximum slug length
pub const GROUP_SLUG_MAX: usize = 50;

/// A topical community posts can be filed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub title: String,
    /// URL slug (unique)
    pub slug: String,
    pub description: String,
}

/// Input for creating a group
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupInput {
    #[serde(default)]
    pub title: String,
    /// Derived from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}
