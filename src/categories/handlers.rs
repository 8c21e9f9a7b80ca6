use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use tracing::{info, instrument};

use super::dto::{CategoryNode, CreateCategoryRequest, UpdateCategoryRequest};
use super::repo::{self, Category};
use super::tree::build_tree;
use crate::auth::extractors::AdminUser;
use crate::error::{is_foreign_key_violation, ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::state::AppState;

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/tree", get(category_tree))
        .route(
            "/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(repo::list_all(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn category_tree(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryNode>>> {
    let cats = repo::list_all(&state.db).await?;
    Ok(Json(build_tree(&cats)))
}

#[instrument(skip(state))]
pub async fn get_category(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<Json<Category>> {
    repo::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("category not found"))
}

fn parent_missing(e: sqlx::Error) -> ApiError {
    if is_foreign_key_violation(&e) {
        ApiError::not_found("parent category not found")
    } else {
        e.into()
    }
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let (name, parent_id) = payload.validate()?;
    let cat = repo::insert(&state.db, &name, parent_id)
        .await
        .map_err(parent_missing)?;
    info!(category_id = cat.id, "category created");
    Ok((StatusCode::CREATED, Json(cat)))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn update_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    let patch = payload.validate()?;
    repo::update(&state.db, id, &patch)
        .await
        .map_err(parent_missing)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("category not found"))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    match repo::delete(&state.db, id).await {
        Ok(true) => {
            info!(category_id = id, "category deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(ApiError::not_found("category not found")),
        Err(e) if is_foreign_key_violation(&e) => Err(ApiError::conflict("category is used by listings")),
        Err(e) => Err(e.into()),
    }
}
