//! Request extractors for the web UI
//!
//! - [`MaybeUser`]: the user behind the `session` cookie, if any
//! - [`LoginRequired`]: the same, but anonymous requests are redirected to
//!   the login page with `next` pointing back
//! - [`PostFormData`]: a post form sent either as multipart (with an image
//!   part) or urlencoded

use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::collections::HashMap;

use crate::api::AppState;
use crate::models::User;
use crate::services::UploadedImage;
use crate::web::WebError;

pub const SESSION_COOKIE: &str = "session";

/// Session id carried by the `session` cookie
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix("session="))
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value opening a session
pub fn session_cookie(id: &str, days: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        id,
        days * 24 * 60 * 60
    )
}

/// `Set-Cookie` value removing the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Login URL that returns to `path` afterwards.
///
/// The path is percent-encoded, except for `/`.
pub fn login_url(path: &str) -> String {
    format!(
        "/auth/login/?next={}",
        urlencoding::encode(path).replace("%2F", "/")
    )
}

/// Current user, or `None` when anonymous
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(id) = session_id(&parts.headers) else {
            return Ok(MaybeUser(None));
        };
        let user = state
            .user_service
            .validate_session(&id)
            .await
            .map_err(|e| WebError::Internal(e.into()))?;
        Ok(MaybeUser(user))
    }
}

/// Current user; anonymous requests are sent to the login page
#[derive(Debug, Clone)]
pub struct LoginRequired(pub User);

impl FromRequestParts<AppState> for LoginRequired {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match user {
            Some(user) => Ok(LoginRequired(user)),
            None => {
                let target = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_url(target)).into_response())
            }
        }
    }
}

/// Fields of the post form
#[derive(Debug, Clone, Default)]
pub struct PostFormData {
    pub text: Option<String>,
    /// Raw value of the group select; empty means no group
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
    /// The "clear" checkbox next to the current image
    pub clear_image: bool,
}

impl PostFormData {
    /// Read the form from a multipart body.
    ///
    /// An `image` part without a file name and content is how browsers send
    /// an untouched file input, so it counts as no upload.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, Response> {
        let mut form = PostFormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(IntoResponse::into_response)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let data = field.bytes().await.map_err(IntoResponse::into_response)?;
                    let untouched =
                        data.is_empty() && file_name.as_deref().map_or(true, str::is_empty);
                    if !untouched {
                        form.image = Some(UploadedImage {
                            file_name,
                            data: data.to_vec(),
                        });
                    }
                }
                _ => {
                    let value = field.text().await.map_err(IntoResponse::into_response)?;
                    form.set(&name, value);
                }
            }
        }
        Ok(form)
    }

    fn from_fields(fields: HashMap<String, String>) -> Self {
        let mut form = PostFormData::default();
        for (name, value) in fields {
            form.set(&name, value);
        }
        form
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "text" => self.text = Some(value),
            "group" => self.group = Some(value),
            "image-clear" => self.clear_image = !value.is_empty() && value != "false",
            _ => {}
        }
    }
}

impl<S> FromRequest<S> for PostFormData
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
            Self::from_multipart(multipart).await
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self::from_fields(fields))
        }
    }
}
