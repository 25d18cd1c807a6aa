//! Data models
//!
//! Database entities and the input types the services accept. Entities that
//! are read straight from SQL derive `sqlx::FromRow`.

mod comment;
mod follow;
mod group;
mod pagination;
mod post;
mod session;
mod user;

pub use comment::{Comment, CreateCommentInput};
pub use follow::{Follow, ProfileStats};
pub use group::{CreateGroupInput, Group, GROUP_SLUG_MAX, GROUP_TITLE_MAX};
pub use pagination::{ListParams, PageInfo, PagedResult};
pub use post::{CreatePostInput, FeedFilter, Post, UpdatePostInput};
pub use session::Session;
pub use user::{CreateUserInput, User};
