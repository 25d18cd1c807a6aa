//! Sign up, log in and log out

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::services::{FieldErrors, RegisterInput, UserServiceError, NON_FIELD_ERRORS};
use crate::web::extract::{clear_session_cookie, session_cookie, session_id, MaybeUser};
use crate::web::{render, WebError};

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

/// One input of the sign-up form
#[derive(Debug, Serialize)]
struct FormField<'a> {
    name: &'static str,
    label: &'static str,
    input_type: &'static str,
    value: &'a str,
    errors: &'a [String],
}

fn signup_fields<'a>(form: &'a SignupForm, errors: &'a FieldErrors) -> Vec<FormField<'a>> {
    let field = |name: &'static str, label: &'static str, input_type: &'static str, value: &'a str| FormField {
        name,
        label,
        input_type,
        value,
        errors: errors.get(name),
    };
    vec![
        field("first_name", "First name", "text", form.first_name.as_str()),
        field("last_name", "Last name", "text", form.last_name.as_str()),
        field("username", "Username", "text", form.username.as_str()),
        field("email", "Email address", "email", form.email.as_str()),
        field("password", "Password", "password", ""),
        field("password_confirm", "Password confirmation", "password", ""),
    ]
}

fn render_signup(
    state: &AppState,
    form: &SignupForm,
    errors: &FieldErrors,
    path: &str,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("fields", &signup_fields(form, errors));
    Ok(render(state, "signup.html", &context, path, None)?.into_response())
}

/// GET /auth/signup/
pub async fn signup_form(State(state): State<AppState>, uri: Uri) -> Result<Response, WebError> {
    render_signup(&state, &SignupForm::default(), &FieldErrors::new(), uri.path())
}

/// POST /auth/signup/
pub async fn signup(
    State(state): State<AppState>,
    uri: Uri,
    Form(form): Form<SignupForm>,
) -> Result<Response, WebError> {
    let input = RegisterInput {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password.clone(),
        password_confirm: form.password_confirm.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
    };

    match state.user_service.register(input).await {
        Ok(_) => Ok(Redirect::to("/auth/login/").into_response()),
        Err(UserServiceError::ValidationError(errors)) => {
            render_signup(&state, &form, &errors, uri.path())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

/// Only same-site paths are followed after login
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

fn render_login(
    state: &AppState,
    username: &str,
    next: &str,
    errors: Option<&FieldErrors>,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("form", &serde_json::json!({ "username": username }));
    context.insert("next", next);
    if let Some(errors) = errors {
        context.insert("errors", errors);
    }
    Ok(render(state, "login.html", &context, "/auth/login/", None)?.into_response())
}

/// GET /auth/login/
pub async fn login_form(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
) -> Result<Response, WebError> {
    render_login(&state, "", query.next.as_deref().unwrap_or_default(), None)
}

/// POST /auth/login/ - opens a session and follows `next`
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    match state.user_service.login(&form.username, &form.password).await {
        Ok((user, session)) => {
            tracing::info!("User {} logged in", user.username);
            let cookie = session_cookie(&session.id, session_days(&session));
            Ok((
                [(header::SET_COOKIE, cookie)],
                Redirect::to(safe_next(&form.next)),
            )
                .into_response())
        }
        Err(UserServiceError::AuthenticationError(message)) => {
            let errors = FieldErrors::single(NON_FIELD_ERRORS, message);
            render_login(&state, &form.username, &form.next, Some(&errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// Whole days until the session expires, at least one
fn session_days(session: &crate::models::Session) -> i64 {
    (session.expires_at - session.created_at).num_days().max(1)
}

/// GET or POST /auth/logout/
pub async fn logout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, WebError> {
    if let Some(id) = session_id(&headers) {
        state.user_service.logout(&id).await?;
    }
    if let Some(user) = &user {
        tracing::info!("User {} logged out", user.username);
    }

    let html = render(&state, "logged_out.html", &TeraContext::new(), uri.path(), None)?;
    Ok(([(header::SET_COOKIE, clear_session_cookie())], html).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next("/follow/"), "/follow/");
        assert_eq!(safe_next("/leo/3/?page=2"), "/leo/3/?page=2");
        assert_eq!(safe_next(""), "/");
        assert_eq!(safe_next("https://evil.example/"), "/");
        assert_eq!(safe_next("//evil.example/"), "/");
        assert_eq!(safe_next("/\\evil.example"), "/");
    }

    #[test]
    fn test_signup_fields_never_echo_passwords() {
        let form = SignupForm {
            username: "leo".to_string(),
            password: "s3cret-pass".to_string(),
            password_confirm: "s3cret-pass".to_string(),
            ..Default::default()
        };
        let mut errors = FieldErrors::new();
        errors.add("username", "taken");
        let fields = signup_fields(&form, &errors);

        let username = fields.iter().find(|f| f.name == "username").unwrap();
        assert_eq!(username.value, "leo");
        assert_eq!(username.errors, ["taken".to_string()]);
        assert!(fields.iter().all(|f| f.value != "s3cret-pass"));
    }
}
