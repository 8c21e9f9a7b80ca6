use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::CreateReviewRequest;
use super::repo;
use super::repo_types::{Review, ReviewView};
use super::services;
use crate::auth::extractors::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::pagination::{Page, Pagination};
use crate::state::AppState;
use crate::users;

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/sales/:id/review", post(create_review))
        .route("/reviews/:user_slug/received", get(list_received))
        .route("/reviews/:user_slug/sent", get(list_sent))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let (rating, comment) = payload.validate()?;
    let review = services::create_review(&state.db, &user, sale_id, rating, &comment).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn user_id_for(state: &AppState, slug: &str) -> ApiResult<String> {
    users::repo::find_visible_by_slug(&state.db, slug)
        .await?
        .map(|u| u.id)
        .ok_or_else(|| ApiError::not_found("user not found"))
}

#[instrument(skip(state))]
pub async fn list_received(
    State(state): State<AppState>,
    Path(user_slug): Path<String>,
    p: Pagination,
) -> ApiResult<Json<Page<ReviewView>>> {
    let user_id = user_id_for(&state, &user_slug).await?;
    let (rows, total) = repo::list_received(&state.db, &user_id, p).await?;
    Ok(Json(Page::new(rows, p, total)))
}

#[instrument(skip(state))]
pub async fn list_sent(
    State(state): State<AppState>,
    Path(user_slug): Path<String>,
    p: Pagination,
) -> ApiResult<Json<Page<ReviewView>>> {
    let user_id = user_id_for(&state, &user_slug).await?;
    let (rows, total) = repo::list_sent(&state.db, &user_id, p).await?;
    Ok(Json(Page::new(rows, p, total)))
}
