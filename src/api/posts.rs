//! Post and comment API endpoints
//!
//! - GET/POST /api/v1/posts/ (`?group=<id>` filter)
//! - GET/PUT/PATCH/DELETE /api/v1/posts/{id}/
//! - GET/POST /api/v1/posts/{post_id}/comments/
//! - GET/PUT/PATCH/DELETE /api/v1/posts/{post_id}/comments/{id}/
//!
//! Reads are anonymous; writes need a bearer token and, for existing
//! objects, must come from the author.

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::api::middleware::{ApiError, ApiJson, ApiPath, AppState, AuthenticatedUser};
use crate::api::responses::{CommentResponse, PostResponse};
use crate::services::{FieldErrors, PostChanges, PostDraft, UploadedImage};
use crate::web::extract::PostFormData;

/// Build the posts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/", get(list_posts).post(create_post))
        .route(
            "/posts/{id}/",
            get(get_post)
                .put(replace_post)
                .patch(patch_post)
                .delete(delete_post),
        )
        .route(
            "/posts/{post_id}/comments/",
            get(list_comments).post(create_comment),
        )
        .route(
            "/posts/{post_id}/comments/{id}/",
            get(get_comment)
                .put(update_comment)
                .patch(update_comment)
                .delete(delete_comment),
        )
}

/// Post fields as submitted, either as JSON or as multipart form data.
///
/// `None` means the field was not sent. In JSON, `"group": null` clears
/// the group and `"image": null` clears the image.
#[derive(Debug, Default)]
pub struct PostPayload {
    pub text: Option<String>,
    pub group: Option<Option<String>>,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

impl PostPayload {
    fn from_json(body: Map<String, Value>) -> Self {
        let as_text = |value: &Value| match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        Self {
            text: body.get("text").map(|v| as_text(v).unwrap_or_default()),
            group: body.get("group").map(as_text),
            image: None,
            clear_image: body.get("image").is_some_and(Value::is_null),
        }
    }

    fn into_draft(self) -> PostDraft {
        PostDraft {
            text: self.text.unwrap_or_default(),
            group: self.group.flatten(),
            image: self.image,
        }
    }

    fn into_changes(self) -> PostChanges {
        PostChanges {
            text: self.text,
            group: self.group,
            image: self.image,
            clear_image: self.clear_image,
        }
    }
}

impl<S> FromRequest<S> for PostPayload
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            let form = PostFormData::from_multipart(multipart).await?;
            Ok(Self {
                text: form.text,
                group: form.group.map(Some),
                image: form.image,
                clear_image: form.clear_image,
            })
        } else {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::from(e).into_response())?;
            Ok(Self::from_json(body))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub group: Option<String>,
}

/// GET /api/v1/posts/
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let group = match query.group.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ApiError::fields(FieldErrors::single(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            ))
        })?),
    };
    let posts = state.post_service.list(group).await?;
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

/// POST /api/v1/posts/
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: PostPayload,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let post = state.post_service.create(&user, payload.into_draft()).await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// GET /api/v1/posts/{id}/
async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    Ok(Json(state.post_service.get(id).await?.into()))
}

/// PUT /api/v1/posts/{id}/ - every writable field is replaced
async fn replace_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    payload: PostPayload,
) -> Result<Json<PostResponse>, ApiError> {
    let changes = PostChanges::from(payload.into_draft());
    let post = state.post_service.update(&user, id, changes).await?;
    Ok(Json(post.into()))
}

/// PATCH /api/v1/posts/{id}/ - only the sent fields change
async fn patch_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    payload: PostPayload,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state
        .post_service
        .update(&user, id, payload.into_changes())
        .await?;
    Ok(Json(post.into()))
}

/// DELETE /api/v1/posts/{id}/
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// GET /api/v1/posts/{post_id}/comments/
async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let comments = state.comment_service.list_for_post(post_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

/// POST /api/v1/posts/{post_id}/comments/
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let text = body.text.unwrap_or_default();
    let comment = state.comment_service.create(&user, post_id, &text).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// GET /api/v1/posts/{post_id}/comments/{id}/
async fn get_comment(
    State(state): State<AppState>,
    ApiPath((post_id, id)): ApiPath<(i64, i64)>,
) -> Result<Json<CommentResponse>, ApiError> {
    Ok(Json(state.comment_service.get(post_id, id).await?.into()))
}

/// PUT or PATCH /api/v1/posts/{post_id}/comments/{id}/
///
/// Text is the only writable field, so a PATCH without it changes nothing.
async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath((post_id, id)): ApiPath<(i64, i64)>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = match body.text {
        Some(text) => {
            state
                .comment_service
                .update(&user, post_id, id, &text)
                .await?
        }
        None => {
            let comment = state.comment_service.get(post_id, id).await?;
            if !user.owns(comment.author_id) {
                return Err(ApiError::forbidden(
                    "You do not have permission to perform this action.",
                ));
            }
            comment
        }
    };
    Ok(Json(comment.into()))
}

/// DELETE /api/v1/posts/{post_id}/comments/{id}/
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiPath((post_id, id)): ApiPath<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(&user, post_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> PostPayload {
        match value {
            Value::Object(map) => PostPayload::from_json(map),
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_json_payload_distinguishes_missing_and_null() {
        let p = payload(json!({ "text": "hi" }));
        assert_eq!(p.text.as_deref(), Some("hi"));
        assert!(p.group.is_none());
        assert!(!p.clear_image);

        let p = payload(json!({ "group": null, "image": null }));
        assert!(p.text.is_none());
        assert_eq!(p.group, Some(None));
        assert!(p.clear_image);

        let p = payload(json!({ "group": 4 }));
        assert_eq!(p.group, Some(Some("4".to_string())));
    }

    #[test]
    fn test_put_payload_fills_missing_fields() {
        let draft = payload(json!({ "group": 4 })).into_draft();
        assert_eq!(draft.text, "");
        assert_eq!(draft.group.as_deref(), Some("4"));
    }
}
