//! Rango HTML pages
//!
//! - GET  /rango/                                 - index
//! - GET  /rango/about/                           - about
//! - GET  /rango/category/{slug}/                 - category with its pages
//! - GET|POST /rango/add_category/                - add a category (login)
//! - GET|POST /rango/category/{slug}/add_page/    - add a page (login)
//! - GET  /rango/goto/?page_id=                   - count a click and redirect
//! - GET  /rango/like/?category_id=               - like a category (login)
//! - GET  /rango/suggest/?suggestion=             - sidebar suggestions
//! - GET|POST /rango/search/                      - web search
//! - GET  /rango/restricted/                      - restricted page (login)

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::middleware::{
    cookie_value, found, visitor_cookie, with_cookie, AppState, LoginRequired, VISITOR_COOKIE,
};
use crate::api::render::HtmlRequest;
use crate::models::{CreateCategoryInput, CreatePageInput};
use crate::services::{CategoryServiceError, PageServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rango/", get(index))
        .route("/rango/about/", get(about))
        .route("/rango/category/{slug}/", get(show_category))
        .route("/rango/add_category/", get(add_category_form).post(add_category))
        .route("/rango/category/{slug}/add_page/", get(add_page_form).post(add_page))
        .route("/rango/goto/", get(goto_url))
        .route("/rango/like/", get(like_category))
        .route("/rango/suggest/", get(suggest_category))
        .route("/rango/search/", get(search_form).post(search))
        .route("/rango/restricted/", get(restricted))
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageForm {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GotoQuery {
    pub page_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LikeQuery {
    pub category_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuggestQuery {
    pub suggestion: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub query: String,
}

/// Count this visit and return the visit total plus the cookie to set
async fn track_visit(state: &AppState, headers: &HeaderMap) -> (i64, Option<String>) {
    let key = cookie_value(headers, VISITOR_COOKIE);
    match state.visitor_service.track(key.as_deref(), Utc::now()).await {
        Ok(session) => (session.visits, Some(visitor_cookie(&session.key))),
        Err(e) => {
            tracing::warn!(error = %e, "Visit tracking failed");
            (1, None)
        }
    }
}

async fn render_index(state: &AppState, page: &HtmlRequest, headers: &HeaderMap) -> Response {
    let top_categories = match state.category_service.top_by_likes().await {
        Ok(c) => c,
        Err(e) => return internal_error(state, page, e).await,
    };
    let pages = match state.page_service.top_by_views().await {
        Ok(p) => p,
        Err(e) => return internal_error(state, page, e).await,
    };
    let (visits, cookie) = track_visit(state, headers).await;

    let mut context = TeraContext::new();
    context.insert("top_categories", &top_categories);
    context.insert("pages", &pages);
    context.insert("visits", &visits);

    let response = page.render(state, "rango/index.html", context).await;
    match cookie {
        Some(cookie) => with_cookie(response, &cookie),
        None => response,
    }
}

async fn render_category(state: &AppState, page: &HtmlRequest, slug: &str) -> Response {
    let category = match state.category_service.get_by_slug(slug).await {
        Ok(c) => c,
        Err(e) => return internal_error(state, page, e).await,
    };

    let pages = match &category {
        Some(c) => match state.page_service.list_by_category(c.id).await {
            Ok(p) => Some(p),
            Err(e) => return internal_error(state, page, e).await,
        },
        None => None,
    };

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("pages", &pages);
    page.render_in_category(
        state,
        "rango/category.html",
        context,
        category.as_ref().map(|c| c.slug.as_str()),
    )
    .await
}

async fn internal_error(
    state: &AppState,
    page: &HtmlRequest,
    err: impl std::fmt::Display,
) -> Response {
    tracing::error!(error = %err, path = %page.path, "Request failed");
    page.render_error(
        state,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong on our side.",
    )
    .await
}

/// GET /rango/
async fn index(State(state): State<AppState>, page: HtmlRequest, headers: HeaderMap) -> Response {
    render_index(&state, &page, &headers).await
}

/// GET /rango/about/
async fn about(State(state): State<AppState>, page: HtmlRequest, headers: HeaderMap) -> Response {
    let (visits, cookie) = track_visit(&state, &headers).await;
    let mut context = TeraContext::new();
    context.insert("visits", &visits);

    let response = page.render(&state, "rango/about.html", context).await;
    match cookie {
        Some(cookie) => with_cookie(response, &cookie),
        None => response,
    }
}

/// GET /rango/category/{slug}/
async fn show_category(
    State(state): State<AppState>,
    page: HtmlRequest,
    Path(slug): Path<String>,
) -> Response {
    render_category(&state, &page, &slug).await
}

/// GET /rango/add_category/
async fn add_category_form(
    State(state): State<AppState>,
    _user: LoginRequired,
    page: HtmlRequest,
) -> Response {
    let mut context = TeraContext::new();
    context.insert("form", &CategoryForm::default());
    context.insert("errors", &Vec::<String>::new());
    page.render(&state, "rango/add_category.html", context).await
}

/// POST /rango/add_category/
///
/// A saved category shows the index page, where it will appear.
async fn add_category(
    State(state): State<AppState>,
    _user: LoginRequired,
    page: HtmlRequest,
    headers: HeaderMap,
    Form(form): Form<CategoryForm>,
) -> Response {
    let errors = match state
        .category_service
        .create(CreateCategoryInput::new(form.name.clone()))
        .await
    {
        Ok(_) => return render_index(&state, &page, &headers).await,
        Err(CategoryServiceError::DuplicateName(_)) => {
            vec!["Category with this name already exists.".to_string()]
        }
        Err(CategoryServiceError::ValidationError(msg)) => vec![msg],
        Err(e) => return internal_error(&state, &page, e).await,
    };

    tracing::debug!(?errors, "Rejected category form");
    let mut context = TeraContext::new();
    context.insert("form", &form);
    context.insert("errors", &errors);
    page.render(&state, "rango/add_category.html", context).await
}

async fn render_add_page(
    state: &AppState,
    page: &HtmlRequest,
    slug: &str,
    form: &PageForm,
    errors: &[String],
) -> Response {
    let category = match state.category_service.get_by_slug(slug).await {
        Ok(c) => c,
        Err(e) => return internal_error(state, page, e).await,
    };

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("form", form);
    context.insert("errors", errors);
    page.render_in_category(
        state,
        "rango/add_page.html",
        context,
        category.as_ref().map(|c| c.slug.as_str()),
    )
    .await
}

/// GET /rango/category/{slug}/add_page/
async fn add_page_form(
    State(state): State<AppState>,
    _user: LoginRequired,
    page: HtmlRequest,
    Path(slug): Path<String>,
) -> Response {
    render_add_page(&state, &page, &slug, &PageForm::default(), &[]).await
}

/// POST /rango/category/{slug}/add_page/
///
/// A saved page shows the category it was added to.
async fn add_page(
    State(state): State<AppState>,
    _user: LoginRequired,
    page: HtmlRequest,
    Path(slug): Path<String>,
    Form(form): Form<PageForm>,
) -> Response {
    let input = CreatePageInput::new(form.title.clone(), form.url.clone());
    let errors = match state.page_service.add_to_category(&slug, input).await {
        Ok(_) => return render_category(&state, &page, &slug).await,
        // The template explains that the category does not exist.
        Err(PageServiceError::CategoryNotFound(_)) => Vec::new(),
        Err(PageServiceError::ValidationError(msg)) => vec![msg],
        Err(e) => return internal_error(&state, &page, e).await,
    };

    render_add_page(&state, &page, &slug, &form, &errors).await
}

/// GET /rango/goto/?page_id=
async fn goto_url(
    State(state): State<AppState>,
    page: HtmlRequest,
    Query(query): Query<GotoQuery>,
) -> Response {
    match state.page_service.track_url(&query.page_id).await {
        Ok(Some(url)) => found(&url),
        Ok(None) => found("/rango/"),
        Err(e) => internal_error(&state, &page, e).await,
    }
}

/// GET /rango/like/?category_id=
///
/// Responds with the new like count as plain text.
async fn like_category(
    State(state): State<AppState>,
    _user: LoginRequired,
    Query(query): Query<LikeQuery>,
) -> Response {
    let raw = query.category_id.trim();
    if raw.is_empty() {
        return "0".into_response();
    }
    let Ok(id) = raw.parse::<i64>() else {
        return (StatusCode::BAD_REQUEST, "Invalid category id").into_response();
    };

    match state.category_service.like(id).await {
        Ok(likes) => likes.to_string().into_response(),
        Err(CategoryServiceError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "Category not found").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Like failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// GET /rango/suggest/?suggestion=
///
/// Renders the sidebar category list fragment for the matching categories.
async fn suggest_category(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> Response {
    let categories = match state.category_service.suggest(&query.suggestion).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Suggestion lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut context = TeraContext::new();
    context.insert("categories", &categories);
    context.insert("act_cat", &None::<String>);
    match state.templates.render("rango/cats.html", &context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render suggestions");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /rango/search/
async fn search_form(State(state): State<AppState>, page: HtmlRequest) -> Response {
    let mut context = TeraContext::new();
    context.insert("query", "");
    context.insert("results", &Vec::<crate::services::SearchResult>::new());
    page.render(&state, "rango/search.html", context).await
}

/// POST /rango/search/
async fn search(
    State(state): State<AppState>,
    page: HtmlRequest,
    Form(form): Form<SearchForm>,
) -> Response {
    let query = form.query.trim().to_string();
    let mut context = TeraContext::new();

    match state.search_service.run_query(&query).await {
        Ok(results) => context.insert("results", &results),
        Err(_) => {
            context.insert("results", &Vec::<crate::services::SearchResult>::new());
            context.insert("error", "Search is unavailable right now. Please try again later.");
        }
    }
    context.insert("query", &query);
    page.render(&state, "rango/search.html", context).await
}

/// GET /rango/restricted/
async fn restricted(
    State(state): State<AppState>,
    _user: LoginRequired,
    page: HtmlRequest,
) -> Response {
    let mut context = TeraContext::new();
    context.insert("description", "You are in the restricted page.");
    page.render(&state, "rango/restricted.html", context).await
}
