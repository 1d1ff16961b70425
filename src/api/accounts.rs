//! Account pages
//!
//! - GET|POST /accounts/register/ - sign up, then continue to the profile form
//! - GET|POST /accounts/login/    - sign in
//! - GET|POST /accounts/logout/   - sign out

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::{
    clear_session_cookie, extract_session_token, found, session_cookie, with_cookie, AppState,
};
use crate::api::render::HtmlRequest;
use crate::models::{LoginInput, RegisterInput};
use crate::services::UserServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts/register/", get(register_form).post(register))
        .route("/accounts/login/", get(login_form).post(login))
        .route("/accounts/logout/", get(logout).post(logout))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NextQuery {
    pub next: String,
}

/// Only same-site paths are accepted as a post-login destination
fn safe_next(next: &str) -> &str {
    let next = next.trim();
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/rango/"
    }
}

fn register_context(username: &str, email: &str, errors: &[String]) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert(
        "form",
        &serde_json::json!({ "username": username, "email": email }),
    );
    context.insert("errors", errors);
    context
}

/// GET /accounts/register/
async fn register_form(State(state): State<AppState>, page: HtmlRequest) -> Response {
    page.render(&state, "rango/register.html", register_context("", "", &[]))
        .await
}

/// POST /accounts/register/
async fn register(
    State(state): State<AppState>,
    page: HtmlRequest,
    Form(input): Form<RegisterInput>,
) -> Response {
    let username = input.username.clone();
    let email = input.email.clone();

    let error = match state.user_service.register(input).await {
        Ok(user) => match state.user_service.start_session(user.id).await {
            Ok(session) => {
                return with_cookie(found("/rango/register_profile/"), &session_cookie(&session))
            }
            Err(e) => e,
        },
        Err(e) => e,
    };

    let message = match error {
        UserServiceError::ValidationError(msg) | UserServiceError::UserExists(msg) => msg,
        other => {
            tracing::error!(error = %other, "Registration failed");
            "Registration failed, please try again.".to_string()
        }
    };

    page.render(
        &state,
        "rango/register.html",
        register_context(&username, &email, &[message]),
    )
    .await
}

fn login_context(username: &str, next: &str, error: Option<&str>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("username", username);
    context.insert("next", next);
    if let Some(error) = error {
        context.insert("error", error);
    }
    context
}

/// GET /accounts/login/
async fn login_form(
    State(state): State<AppState>,
    page: HtmlRequest,
    Query(query): Query<NextQuery>,
) -> Response {
    page.render(&state, "rango/login.html", login_context("", &query.next, None))
        .await
}

/// POST /accounts/login/
async fn login(
    State(state): State<AppState>,
    page: HtmlRequest,
    Form(form): Form<LoginForm>,
) -> Response {
    let input = LoginInput {
        username: form.username.clone(),
        password: form.password,
    };

    let error = match state.user_service.login(input).await {
        Ok(session) => {
            tracing::info!(user_id = session.user_id, "User logged in");
            return with_cookie(found(safe_next(&form.next)), &session_cookie(&session));
        }
        Err(UserServiceError::AuthenticationError(msg)) => msg,
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            "Login failed, please try again.".to_string()
        }
    };

    page.render(
        &state,
        "rango/login.html",
        login_context(&form.username, &form.next, Some(&error)),
    )
    .await
}

/// GET|POST /accounts/logout/
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(e) = state.user_service.logout(&token).await {
            tracing::warn!(error = %e, "Failed to drop session");
        }
    }
    with_cookie(found("/rango/"), &clear_session_cookie())
}
