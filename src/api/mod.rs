//! HTTP layer - handlers and routing
//!
//! - `views`: the rango HTML pages
//! - `profiles`: profile registration, viewing and editing
//! - `accounts`: sign-up, login and logout
//! - `categories`, `pages`: the REST API under `/rango/api/`
//! - `/media/`: uploaded profile pictures

pub mod accounts;
pub mod categories;
pub mod common;
pub mod middleware;
pub mod pages;
pub mod profiles;
pub mod render;
pub mod views;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxPageRepository, SqlxProfileRepository, SqlxSessionRepository,
    SqlxUserRepository, SqlxVisitorSessionRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    BingSearch, CategoryService, PageService, ProfileService, SearchService, UserService,
    VisitorService,
};
use crate::templates::TemplateEngine;

pub use common::ApiBase;
pub use middleware::{ApiError, AppState};

/// Wire repositories and services together for a connected, migrated pool
pub fn build_state(pool: DynDatabasePool, config: &Config) -> anyhow::Result<AppState> {
    let cache = create_cache(&config.cache);

    let category_repo = SqlxCategoryRepository::boxed(pool.clone());
    let user_repo = SqlxUserRepository::boxed(pool.clone());

    let templates = TemplateEngine::new(config.templates.path.as_deref())?;
    let search = BingSearch::new(config.search.clone())?;

    Ok(AppState {
        user_service: Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
        )),
        category_service: Arc::new(CategoryService::new(category_repo.clone(), cache)),
        page_service: Arc::new(PageService::new(
            SqlxPageRepository::boxed(pool.clone()),
            category_repo,
        )),
        profile_service: Arc::new(ProfileService::new(
            SqlxProfileRepository::boxed(pool.clone()),
            user_repo,
            config.media.clone(),
        )),
        visitor_service: Arc::new(VisitorService::new(SqlxVisitorSessionRepository::boxed(
            pool,
        ))),
        search_service: Arc::new(SearchService::new(Arc::new(search))),
        templates: Arc::new(templates),
    })
}

/// Build the REST API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/rango/api/", get(api_root))
        .merge(categories::router())
        .merge(pages::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str, media_path: &Path) -> Router {
    let max_file_size = state.profile_service.media().max_file_size;

    Router::new()
        .route("/", get(redirect_to_index))
        .route("/rango", get(redirect_to_index))
        .merge(views::router())
        .merge(profiles::router(max_file_size))
        .merge(accounts::router())
        .merge(build_api_router())
        .nest_service("/media", ServeDir::new(media_path))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(cors_layer(cors_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cookie-aware CORS for one configured origin; `*` allows any origin
/// without credentials.
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if cors_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!(%cors_origin, error = %e, "Invalid CORS origin, allowing any origin");
            cors.allow_origin(Any)
        }
    }
}

async fn redirect_to_index() -> Response {
    middleware::found("/rango/")
}

/// GET /rango/api/
async fn api_root(base: ApiBase) -> Json<serde_json::Value> {
    Json(json!({
        "categories": base.link("/categories/"),
        "pages": base.link("/pages/"),
    }))
}
