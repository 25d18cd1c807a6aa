//! Pages that change data: posting, editing, commenting and following.
//!
//! Forms follow validate-then-save: a valid submission redirects, an invalid
//! one re-renders the form with its field errors and status 200.

use axum::{
    extract::{Path, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::models::{Post, User};
use crate::services::{
    CommentServiceError, FieldErrors, PostChanges, PostDraft, PostServiceError,
};
use crate::web::extract::{LoginRequired, PostFormData};
use crate::web::pages::post_context;
use crate::web::{parse_id, render, WebError};

fn post_url(post: &Post) -> String {
    format!("/{}/{}/", post.author_username, post.id)
}

/// Values shown back in the post form
#[derive(Debug, Default, serde::Serialize)]
struct FormValues {
    text: String,
    group: String,
}

struct PostFormPage<'a> {
    values: FormValues,
    errors: Option<&'a FieldErrors>,
    /// The post being edited
    post: Option<&'a Post>,
}

async fn render_post_form(
    state: &AppState,
    page: PostFormPage<'_>,
    path: &str,
    user: &User,
) -> Result<Response, WebError> {
    let groups = state.group_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("form", &page.values);
    context.insert("groups", &groups);
    context.insert("is_edit", &page.post.is_some());
    context.insert("has_image", &page.post.is_some_and(Post::has_image));
    context.insert(
        "current_image",
        &page.post.and_then(|p| p.image.clone()).unwrap_or_default(),
    );
    if let Some(errors) = page.errors {
        context.insert("errors", errors);
    }
    Ok(render(state, "post_form.html", &context, path, Some(user))?.into_response())
}

/// GET /new/
pub async fn new_post_form(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    uri: Uri,
) -> Result<Response, WebError> {
    let page = PostFormPage {
        values: FormValues::default(),
        errors: None,
        post: None,
    };
    render_post_form(&state, page, uri.path(), &user).await
}

/// POST /new/
pub async fn create_post(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    uri: Uri,
    form: PostFormData,
) -> Result<Response, WebError> {
    let values = FormValues {
        text: form.text.clone().unwrap_or_default(),
        group: form.group.clone().unwrap_or_default(),
    };
    let draft = PostDraft {
        text: form.text.unwrap_or_default(),
        group: form.group,
        image: form.image,
    };

    match state.post_service.create(&user, draft).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(PostServiceError::ValidationError(errors)) => {
            let page = PostFormPage {
                values,
                errors: Some(&errors),
                post: None,
            };
            render_post_form(&state, page, uri.path(), &user).await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /{username}/{post_id}/edit/
///
/// Anyone but the author is sent back to the post page.
pub async fn edit_post_form(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
) -> Result<Response, WebError> {
    let post = state
        .post_service
        .get_by_author(&username, parse_id(&post_id)?)
        .await?;
    if !user.owns(post.author_id) {
        return Ok(Redirect::to(&post_url(&post)).into_response());
    }

    let page = PostFormPage {
        values: FormValues {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()).unwrap_or_default(),
        },
        errors: None,
        post: Some(&post),
    };
    render_post_form(&state, page, uri.path(), &user).await
}

/// POST /{username}/{post_id}/edit/
pub async fn update_post(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
    form: PostFormData,
) -> Result<Response, WebError> {
    let post = state
        .post_service
        .get_by_author(&username, parse_id(&post_id)?)
        .await?;

    let values = FormValues {
        text: form.text.clone().unwrap_or_default(),
        group: form.group.clone().unwrap_or_default(),
    };
    let changes = PostChanges {
        text: Some(form.text.unwrap_or_default()),
        group: Some(form.group),
        image: form.image,
        clear_image: form.clear_image,
    };

    match state.post_service.update(&user, post.id, changes).await {
        Ok(updated) => Ok(Redirect::to(&post_url(&updated)).into_response()),
        Err(PostServiceError::PermissionDenied) => Ok(Redirect::to(&post_url(&post)).into_response()),
        Err(PostServiceError::ValidationError(errors)) => {
            let page = PostFormPage {
                values,
                errors: Some(&errors),
                post: Some(&post),
            };
            render_post_form(&state, page, uri.path(), &user).await
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

/// POST /{username}/{post_id}/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Result<Response, WebError> {
    let post = state
        .post_service
        .get_by_author(&username, parse_id(&post_id)?)
        .await?;

    match state.comment_service.create(&user, post.id, &form.text).await {
        Ok(_) => Ok(Redirect::to(&post_url(&post)).into_response()),
        Err(CommentServiceError::ValidationError(errors)) => {
            let context = post_context(&state, &post, &form.text, Some(&errors)).await?;
            Ok(render(&state, "post.html", &context, &post_url(&post), Some(&user))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /{username}/{post_id}/comment/ - the form lives on the post page
pub async fn comment_redirect(
    Path((username, post_id)): Path<(String, String)>,
) -> Redirect {
    Redirect::to(&format!("/{}/{}/", username, post_id))
}

/// GET /{username}/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Path(username): Path<String>,
) -> Result<Redirect, WebError> {
    let author = state.follow_service.follow(&user, &username).await?;
    Ok(Redirect::to(&format!("/{}/", author.username)))
}

/// GET /{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Path(username): Path<String>,
) -> Result<Redirect, WebError> {
    let author = state.follow_service.unfollow(&user, &username).await?;
    Ok(Redirect::to(&format!("/{}/", author.username)))
}
