//! Category REST endpoints
//!
//! - GET    /rango/api/categories/      - list, most liked first
//! - POST   /rango/api/categories/      - create (auth)
//! - GET    /rango/api/categories/{id}/ - retrieve
//! - PUT    /rango/api/categories/{id}/ - update (auth)
//! - PATCH  /rango/api/categories/{id}/ - partial update (auth)
//! - DELETE /rango/api/categories/{id}/ - delete with its pages (auth)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rango/api/categories/", get(list_categories).post(create_category))
        .route(
            "/rango/api/categories/{id}/",
            get(get_category)
                .put(update_category)
                .patch(patch_category)
                .delete(delete_category),
        )
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CategoryResponse {
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            name: category.name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryBody {
    #[serde(default)]
    pub name: Option<String>,
}

fn required(field: &str) -> ApiError {
    ApiError::with_details(
        "VALIDATION_ERROR",
        format!("{} is required", field),
        json!({ field: ["This field is required."] }),
    )
}

async fn find(state: &AppState, id: i64) -> Result<Category, ApiError> {
    state
        .category_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))
}

/// GET /rango/api/categories/
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.category_service.list_by_likes().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// POST /rango/api/categories/
async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CategoryBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.name.ok_or_else(|| required("name"))?;
    let category = state
        .category_service
        .create(CreateCategoryInput::new(name))
        .await?;

    tracing::info!(category_id = category.id, user_id = user.id, "Category created via API");
    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}

/// GET /rango/api/categories/{id}/
async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CategoryResponse>, ApiError> {
    Ok(Json(find(&state, id).await?.into()))
}

/// PUT /rango/api/categories/{id}/
async fn update_category(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CategoryBody>,
) -> Result<Json<CategoryResponse>, ApiError> {
    find(&state, id).await?;
    let name = body.name.ok_or_else(|| required("name"))?;
    let category = state
        .category_service
        .update(id, UpdateCategoryInput::new().with_name(name))
        .await?;
    Ok(Json(category.into()))
}

/// PATCH /rango/api/categories/{id}/
async fn patch_category(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CategoryBody>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = state
        .category_service
        .update(id, UpdateCategoryInput { name: body.name })
        .await?;
    Ok(Json(category.into()))
}

/// DELETE /rango/api/categories/{id}/
async fn delete_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    tracing::info!(category_id = id, user_id = user.id, "Category deleted via API");
    Ok(StatusCode::NO_CONTENT)
}
