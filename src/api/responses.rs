//! Shared API response types
//!
//! Related objects are referenced by username (authors, follows) or by id
//! (groups, posts), never embedded.

use serde::Serialize;

use crate::models::{Comment, Follow, Post};

/// Prefix under which stored images are served
pub const MEDIA_URL: &str = "/media/";

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub text: String,
    /// Author username
    pub author: String,
    pub pub_date: String,
    /// Group id
    pub group: Option<i64>,
    /// Image URL
    pub image: Option<String>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        let image = post
            .has_image()
            .then(|| post.image.map(|path| format!("{}{}", MEDIA_URL, path)))
            .flatten();
        Self {
            id: post.id,
            text: post.text,
            author: post.author_username,
            pub_date: post.pub_date.to_rfc3339(),
            group: post.group_id,
            image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub author: String,
    /// Post id
    pub post: i64,
    pub text: String,
    pub created: String,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author_username,
            post: comment.post_id,
            text: comment.text,
            created: comment.created.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    /// Follower username
    pub user: String,
    /// Followed author username
    pub following: String,
}

impl From<Follow> for FollowResponse {
    fn from(follow: Follow) -> Self {
        Self {
            user: follow.user_username,
            following: follow.author_username,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(image: Option<&str>) -> Post {
        Post {
            id: 3,
            text: "Hello".to_string(),
            pub_date: Utc::now(),
            image: image.map(str::to_string),
            author_id: 1,
            author_username: "leo".to_string(),
            group_id: Some(2),
            group_slug: Some("cats".to_string()),
            group_title: Some("Cats".to_string()),
            comment_count: 0,
        }
    }

    #[test]
    fn test_post_response_fields() {
        let json = serde_json::to_value(PostResponse::from(post(Some("posts/a.png")))).unwrap();
        assert_eq!(json["author"], "leo");
        assert_eq!(json["group"], 2);
        assert_eq!(json["image"], "/media/posts/a.png");
        assert!(json.get("group_slug").is_none());

        let json = serde_json::to_value(PostResponse::from(post(Some("")))).unwrap();
        assert!(json["image"].is_null());
    }
}
