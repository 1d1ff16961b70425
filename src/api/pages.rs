//! Page REST endpoints
//!
//! - GET    /rango/api/pages/      - list, most viewed first
//! - POST   /rango/api/pages/      - create (auth)
//! - GET    /rango/api/pages/{id}/ - retrieve
//! - PUT    /rango/api/pages/{id}/ - update (auth)
//! - PATCH  /rango/api/pages/{id}/ - partial update (auth)
//! - DELETE /rango/api/pages/{id}/ - delete (auth)
//!
//! `category` is a hyperlink to the category resource on output and may be a
//! hyperlink or a plain id on input.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::common::{parse_category_ref, ApiBase};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreatePageInput, Page, UpdatePageInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rango/api/pages/", get(list_pages).post(create_page))
        .route(
            "/rango/api/pages/{id}/",
            get(get_page)
                .put(update_page)
                .patch(patch_page)
                .delete(delete_page),
        )
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PageResponse {
    pub category: String,
    pub title: String,
    pub url: String,
}

impl PageResponse {
    fn new(base: &ApiBase, page: Page) -> Self {
        Self {
            category: base.category(page.category_id),
            title: page.title,
            url: page.url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageBody {
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PageBody {
    fn category_id(&self) -> Result<Option<i64>, ApiError> {
        match &self.category {
            None => Ok(None),
            Some(value) => parse_category_ref(value).map(Some).ok_or_else(|| {
                ApiError::with_details(
                    "VALIDATION_ERROR",
                    "Invalid category",
                    json!({ "category": ["Invalid hyperlink - No URL match."] }),
                )
            }),
        }
    }

    /// Every field must be present for create and full update
    fn require_all(&self) -> Result<(), ApiError> {
        let mut missing = serde_json::Map::new();
        for (field, present) in [
            ("category", self.category.is_some()),
            ("title", self.title.is_some()),
            ("url", self.url.is_some()),
        ] {
            if !present {
                missing.insert(field.to_string(), json!(["This field is required."]));
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::with_details(
                "VALIDATION_ERROR",
                "Missing required fields",
                Value::Object(missing),
            ))
        }
    }

    fn into_update(self) -> Result<UpdatePageInput, ApiError> {
        Ok(UpdatePageInput {
            category_id: self.category_id()?,
            title: self.title,
            url: self.url,
        })
    }
}

/// GET /rango/api/pages/
async fn list_pages(
    State(state): State<AppState>,
    base: ApiBase,
) -> Result<Json<Vec<PageResponse>>, ApiError> {
    let pages = state.page_service.list().await?;
    Ok(Json(
        pages.into_iter().map(|p| PageResponse::new(&base, p)).collect(),
    ))
}

/// POST /rango/api/pages/
async fn create_page(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    base: ApiBase,
    Json(body): Json<PageBody>,
) -> Result<impl IntoResponse, ApiError> {
    body.require_all()?;
    let category_id = body.category_id()?.unwrap_or_default();
    let input = CreatePageInput::new(
        body.title.unwrap_or_default(),
        body.url.unwrap_or_default(),
    );

    let page = state.page_service.create(category_id, input).await?;
    tracing::info!(page_id = page.id, user_id = user.id, "Page created via API");
    Ok((StatusCode::CREATED, Json(PageResponse::new(&base, page))))
}

/// GET /rango/api/pages/{id}/
async fn get_page(
    State(state): State<AppState>,
    base: ApiBase,
    Path(id): Path<i64>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = state
        .page_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;
    Ok(Json(PageResponse::new(&base, page)))
}

/// PUT /rango/api/pages/{id}/
async fn update_page(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    base: ApiBase,
    Path(id): Path<i64>,
    Json(body): Json<PageBody>,
) -> Result<Json<PageResponse>, ApiError> {
    if state.page_service.get_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("Not found."));
    }
    body.require_all()?;
    let page = state.page_service.update(id, body.into_update()?).await?;
    Ok(Json(PageResponse::new(&base, page)))
}

/// PATCH /rango/api/pages/{id}/
async fn patch_page(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    base: ApiBase,
    Path(id): Path<i64>,
    Json(body): Json<PageBody>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = state.page_service.update(id, body.into_update()?).await?;
    Ok(Json(PageResponse::new(&base, page)))
}

/// DELETE /rango/api/pages/{id}/
async fn delete_page(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.page_service.delete(id).await?;
    tracing::info!(page_id = id, user_id = user.id, "Page deleted via API");
    Ok(StatusCode::NO_CONTENT)
}
