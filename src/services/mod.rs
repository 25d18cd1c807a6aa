//! Services layer - Business logic
//!
//! Services sit between the HTTP surfaces and the repositories. They are
//! responsible for:
//! - validation, reported as per-field errors
//! - author-only permission checks
//! - coordinating repositories, image storage and tokens

pub mod comment;
pub mod follow;
pub mod group;
pub mod image;
pub mod password;
pub mod post;
pub mod token;
pub mod user;
pub mod validation;

pub use comment::{CommentService, CommentServiceError};
pub use follow::{FollowService, FollowServiceError};
pub use group::{generate_slug, GroupService, GroupServiceError};
pub use image::{ImageError, ImageService, UploadedImage, INVALID_IMAGE};
pub use password::{hash_password, verify_password};
pub use post::{PostChanges, PostDraft, PostService, PostServiceError, Profile};
pub use token::{Claims, TokenPair, TokenService, TokenServiceError};
pub use user::{RegisterInput, UserService, UserServiceError};
pub use validation::{FieldErrors, NON_FIELD_ERRORS};
