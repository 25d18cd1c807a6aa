//! Read-only pages: the feeds, profiles and post details

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::Html,
};
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::cache::{make_fragment_key, CacheLayer};
use crate::models::{ListParams, PagedResult, Post};
use crate::web::extract::{LoginRequired, MaybeUser};
use crate::web::{parse_id, render, PageQuery, WebError};

fn feed_context(posts: &PagedResult<Post>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("posts", &posts.items);
    context.insert("page", &posts.page_info());
    context
}

/// GET / - latest posts.
///
/// The post list is rendered once per page number and kept in the fragment
/// cache; posting does not refresh it before it expires.
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Html<String>, WebError> {
    let page_number = ListParams::from_query(query.page.as_deref(), 1).page;
    let key = make_fragment_key("index_page", &[page_number.to_string()]);

    let feed_html = match state.cache.get::<String>(&key).await {
        Ok(Some(html)) => html,
        cached => {
            if let Err(e) = cached {
                tracing::warn!("Ignoring unreadable cache entry {}: {:#}", key, e);
            }
            let posts = state.post_service.index(query.page.as_deref()).await?;
            let html = state
                .theme_engine
                .render("index_feed.html", &feed_context(&posts))?;
            state.cache.set(&key, &html, state.fragment_ttl).await?;
            html
        }
    };

    let mut context = TeraContext::new();
    context.insert("feed_html", &feed_html);
    render(&state, "index.html", &context, uri.path(), user.as_ref())
}

/// GET /group/{slug}/
pub async fn group_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Html<String>, WebError> {
    let (group, posts) = state
        .post_service
        .group_feed(&slug, query.page.as_deref())
        .await?;

    let mut context = feed_context(&posts);
    context.insert("group", &group);
    render(&state, "group.html", &context, uri.path(), user.as_ref())
}

/// GET /follow/ - posts by the authors the user follows
pub async fn follow_index(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Html<String>, WebError> {
    let posts = state
        .post_service
        .follow_feed(&user, query.page.as_deref())
        .await?;
    render(&state, "follow.html", &feed_context(&posts), uri.path(), Some(&user))
}

/// GET /{username}/
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Html<String>, WebError> {
    let profile = state
        .post_service
        .profile(&username, query.page.as_deref(), user.as_ref())
        .await?;

    let mut context = feed_context(&profile.posts);
    context.insert("author", &profile.author);
    context.insert("author_name", &profile.author.display_name());
    context.insert("posts_count", &profile.stats.posts_count);
    context.insert("followers_count", &profile.stats.followers_count);
    context.insert("following_count", &profile.stats.following_count);
    context.insert("following", &profile.following);
    context.insert(
        "is_self",
        &user.as_ref().is_some_and(|u| u.id == profile.author.id),
    );
    render(&state, "profile.html", &context, uri.path(), user.as_ref())
}

/// GET /{username}/{post_id}/
pub async fn post_view(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path((username, post_id)): Path<(String, String)>,
    uri: Uri,
) -> Result<Html<String>, WebError> {
    let post = state
        .post_service
        .get_by_author(&username, parse_id(&post_id)?)
        .await?;
    let context = post_context(&state, &post, "", None).await?;
    render(&state, "post.html", &context, uri.path(), user.as_ref())
}

/// Context of the post page, with the comment form state
pub(crate) async fn post_context(
    state: &AppState,
    post: &Post,
    comment_text: &str,
    comment_errors: Option<&crate::services::FieldErrors>,
) -> Result<TeraContext, WebError> {
    let comments = state.comment_service.list_for_post(post.id).await?;

    let mut context = TeraContext::new();
    context.insert("post", post);
    context.insert("comments", &comments);
    context.insert("comment_text", comment_text);
    if let Some(errors) = comment_errors {
        context.insert("comment_errors", errors);
    }
    Ok(context)
}
