//! HTML page rendering
//!
//! `HtmlRequest` collects what every page needs from the request (path and
//! signed-in user) and renders templates with the sidebar and user filled in.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::models::User;
use crate::templates::{CurrentUser, StandardTemplateVars, ERROR_TEMPLATE};

#[derive(Debug, Clone)]
pub struct HtmlRequest {
    pub path: String,
    pub user: Option<User>,
}

impl<S> FromRequestParts<S> for HtmlRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            path: parts.uri.path().to_string(),
            user: parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        })
    }
}

impl HtmlRequest {
    pub async fn render(&self, state: &AppState, template: &str, context: TeraContext) -> Response {
        self.render_page(state, StatusCode::OK, template, context, None)
            .await
    }

    /// Render with `act_cat` highlighted in the sidebar
    pub async fn render_in_category(
        &self,
        state: &AppState,
        template: &str,
        context: TeraContext,
        act_cat: Option<&str>,
    ) -> Response {
        self.render_page(state, StatusCode::OK, template, context, act_cat)
            .await
    }

    /// Error page with the given status
    pub async fn render_error(
        &self,
        state: &AppState,
        status: StatusCode,
        message: &str,
    ) -> Response {
        let mut context = TeraContext::new();
        context.insert("status", &status.as_u16());
        context.insert("error_message", message);
        self.render_page(state, status, ERROR_TEMPLATE, context, None)
            .await
    }

    async fn render_page(
        &self,
        state: &AppState,
        status: StatusCode,
        template: &str,
        mut context: TeraContext,
        act_cat: Option<&str>,
    ) -> Response {
        let categories = state.category_service.list().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load sidebar categories");
            Vec::new()
        });

        let mut vars = StandardTemplateVars::new(self.path.clone(), categories)
            .with_user(self.user.as_ref().map(CurrentUser::from));
        if let Some(slug) = act_cat {
            vars = vars.with_active_category(slug);
        }
        vars.insert_into(&mut context);

        let html = state.templates.render_with_fallback(template, &context);
        (status, Html(html)).into_response()
    }
}
