//! API middleware
//!
//! Shared application state, the JSON error type of the REST API, and
//! session handling:
//! - `optional_auth` resolves the `session` cookie (or a Bearer token) on
//!   every request and stores the user in the request extensions
//! - `AuthenticatedUser` requires a user and rejects with a JSON 401
//! - `LoginRequired` requires a user and redirects HTML clients to the
//!   login page

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{Session, User};
use crate::models::visitor::VISITOR_SESSION_LIFETIME_DAYS;
use crate::services::{
    CategoryService, CategoryServiceError, PageService, PageServiceError, ProfileService,
    ProfileServiceError, SearchService, UserService, UserServiceError, VisitorService,
};
use crate::templates::TemplateEngine;

/// Name of the login session cookie
pub const SESSION_COOKIE: &str = "session";

/// Name of the anonymous visitor cookie
pub const VISITOR_COOKIE: &str = "sessionid";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub page_service: Arc<PageService>,
    pub profile_service: Arc<ProfileService>,
    pub visitor_service: Arc<VisitorService>,
    pub search_service: Arc<SearchService>,
    pub templates: Arc<TemplateEngine>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))
    }
}

/// A signed-in user for HTML pages; anonymous visitors are sent to the
/// login page with `next` pointing back here.
#[derive(Debug, Clone)]
pub struct LoginRequired(pub User);

impl<S> FromRequestParts<S> for LoginRequired
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthenticatedUser>() {
            Some(user) => Ok(LoginRequired(user.0.clone())),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/rango/");
                Err(found(&format!(
                    "/accounts/login/?next={}",
                    urlencoding::encode(next)
                )))
            }
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Logs the cause and hides it from the client
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Internal error");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::DuplicateName(name) => ApiError::with_details(
                "VALIDATION_ERROR",
                format!("Category with this name already exists: {}", name),
                serde_json::json!({ "name": ["category with this name already exists."] }),
            ),
            CategoryServiceError::NotFound(_) => ApiError::not_found("Not found."),
            CategoryServiceError::ValidationError(msg) => ApiError::with_details(
                "VALIDATION_ERROR",
                msg.clone(),
                serde_json::json!({ "name": [msg] }),
            ),
            CategoryServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<PageServiceError> for ApiError {
    fn from(err: PageServiceError) -> Self {
        match err {
            PageServiceError::CategoryNotFound(id) => ApiError::with_details(
                "VALIDATION_ERROR",
                format!("Invalid category: {}", id),
                serde_json::json!({ "category": ["Invalid hyperlink - Object does not exist."] }),
            ),
            PageServiceError::NotFound(_) => ApiError::not_found("Not found."),
            PageServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PageServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::new("CONFLICT", msg),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ProfileServiceError> for ApiError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::AlreadyExists(_) => ApiError::new("CONFLICT", err.to_string()),
            ProfileServiceError::UserNotFound(_) => ApiError::not_found(err.to_string()),
            ProfileServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            ProfileServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProfileServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

/// Value of the cookie called `name`
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Session token from a Bearer header, else from the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    cookie_value(headers, SESSION_COOKIE)
}

/// `Set-Cookie` value for a new login session
pub fn session_cookie(session: &Session) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session.id,
        session.max_age_seconds()
    )
}

/// `Set-Cookie` value that removes the login session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// `Set-Cookie` value for the visitor tracking cookie
pub fn visitor_cookie(key: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        VISITOR_COOKIE,
        key,
        VISITOR_SESSION_LIFETIME_DAYS * 24 * 60 * 60
    )
}

/// A 302 redirect
pub fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(_) => {
            response
                .headers_mut()
                .insert(header::LOCATION, HeaderValue::from_static("/rango/"));
        }
    }
    response
}

/// Attach a `Set-Cookie` header to a response
pub fn with_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Optional authentication middleware
///
/// Resolves the session for every request. Invalid or expired tokens are
/// treated as anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Session validation failed"),
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer abc123")]);
        assert_eq!(extract_session_token(&h).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let h = headers(&[(header::COOKIE, "sessionid=visitor; session=tok42; other=x")]);
        assert_eq!(extract_session_token(&h).as_deref(), Some("tok42"));
    }

    #[test]
    fn test_bearer_takes_priority() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "session=from-cookie"),
        ]);
        assert_eq!(extract_session_token(&h).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_extract_session_token_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        let h = headers(&[
            (header::AUTHORIZATION, "Basic dXNlcjpwYXNz"),
            (header::COOKIE, "session="),
        ]);
        assert!(extract_session_token(&h).is_none());
    }

    #[test]
    fn test_cookie_value_does_not_match_prefixes() {
        let h = headers(&[(header::COOKIE, "sessionid=visitor-key")]);
        assert_eq!(cookie_value(&h, VISITOR_COOKIE).as_deref(), Some("visitor-key"));
        assert!(cookie_value(&h, SESSION_COOKIE).is_none());
    }

    #[test]
    fn test_cookie_builders() {
        let session = Session::new(1);
        let cookie = session_cookie(&session);
        assert!(cookie.starts_with(&format!("session={};", session.id)));
        assert!(cookie.contains("HttpOnly"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
        assert!(visitor_cookie("k").starts_with("sessionid=k;"));
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::new("CONFLICT", "x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::internal_error("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = ApiError::internal_error("db password is hunter2");
        assert!(!err.error.message.contains("hunter2"));
    }

    #[test]
    fn test_service_error_mapping() {
        let dup: ApiError = CategoryServiceError::DuplicateName("Python".to_string()).into();
        assert_eq!(dup.status(), StatusCode::BAD_REQUEST);
        assert!(dup.error.details.is_some());

        let missing: ApiError = PageServiceError::NotFound(3).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let forbidden: ApiError = ProfileServiceError::Forbidden.into();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_found_redirect() {
        let response = found("/rango/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/rango/");
    }
}
