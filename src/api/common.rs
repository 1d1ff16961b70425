//! Common REST utilities
//!
//! Resources link to each other with absolute URLs built from the request's
//! `Host` (and `X-Forwarded-Proto`) headers.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use serde_json::Value;

/// Mount point of the REST API
pub const API_ROOT: &str = "/rango/api";

/// Scheme and authority of the current request, e.g. `http://localhost:8000`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase(pub String);

impl<S> FromRequestParts<S> for ApiBase
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .filter(|s| *s == "https" || *s == "http")
            .unwrap_or("http");
        Ok(ApiBase(format!("{}://{}", scheme, host)))
    }
}

impl ApiBase {
    pub fn link(&self, path: &str) -> String {
        format!("{}{}{}", self.0, API_ROOT, path)
    }

    pub fn category(&self, id: i64) -> String {
        self.link(&format!("/categories/{}/", id))
    }
}

/// Category id from a hyperlink (`.../categories/{id}/`), a numeric string
/// or a bare number
pub fn parse_category_ref(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(id) = s.parse::<i64>() {
                return Some(id);
            }
            let path = s.split(['?', '#']).next().unwrap_or(s);
            let mut segments = path.trim_end_matches('/').rsplit('/');
            let id = segments.next()?.parse::<i64>().ok()?;
            (segments.next()? == "categories").then_some(id)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    async fn base_for(request: Request<()>) -> ApiBase {
        let (mut parts, _) = request.into_parts();
        ApiBase::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_api_base_from_host() {
        let request = Request::builder()
            .uri("/rango/api/")
            .header(header::HOST, "rango.example.com:8000")
            .body(())
            .unwrap();
        let base = base_for(request).await;
        assert_eq!(base.0, "http://rango.example.com:8000");
        assert_eq!(
            base.category(3),
            "http://rango.example.com:8000/rango/api/categories/3/"
        );
    }

    #[tokio::test]
    async fn test_api_base_forwarded_proto() {
        let request = Request::builder()
            .uri("/rango/api/")
            .header(header::HOST, "rango.example.com")
            .header("x-forwarded-proto", "https")
            .body(())
            .unwrap();
        assert_eq!(base_for(request).await.category(1), "https://rango.example.com/rango/api/categories/1/");
    }

    #[test]
    fn test_parse_category_ref() {
        assert_eq!(parse_category_ref(&json!(4)), Some(4));
        assert_eq!(parse_category_ref(&json!("4")), Some(4));
        assert_eq!(
            parse_category_ref(&json!("http://localhost:8000/rango/api/categories/12/")),
            Some(12)
        );
        assert_eq!(parse_category_ref(&json!("/rango/api/categories/12")), Some(12));
        assert_eq!(parse_category_ref(&json!("/rango/api/pages/12/")), None);
        assert_eq!(parse_category_ref(&json!("python")), None);
        assert_eq!(parse_category_ref(&json!(null)), None);
    }
}
