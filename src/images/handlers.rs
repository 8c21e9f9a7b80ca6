use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateImageRequest, ImageResponse, PresignRequest, PresignResponse, UpdateImageRequest};
use super::{repo, services};
use crate::auth::extractors::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::state::AppState;

pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/listing-images/presign", post(presign))
        .route("/listing-images", post(create_image))
        .route("/listing-images/listing/:listing_id", get(list_images))
        .route(
            "/listing-images/:id",
            get(get_image).put(update_image).delete(delete_image),
        )
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn presign(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<PresignRequest>,
) -> ApiResult<Json<PresignResponse>> {
    Ok(Json(services::presign_upload(&state, &payload.content_type).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateImageRequest>,
) -> ApiResult<(StatusCode, Json<ImageResponse>)> {
    let image = services::attach(&state, &user, payload.listing_id, &payload.key, payload.display_order).await?;
    Ok((StatusCode::CREATED, Json(services::to_response(&state, image))))
}

#[instrument(skip(state))]
pub async fn list_images(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ImageResponse>>> {
    let images = repo::list_by_listing(&state.db, listing_id).await?;
    Ok(Json(
        images
            .into_iter()
            .map(|img| services::to_response(&state, img))
            .collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_image(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ImageResponse>> {
    let owned = repo::find_owned(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("image not found"))?;
    Ok(Json(services::to_response(&state, owned.image)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateImageRequest>,
) -> ApiResult<Json<ImageResponse>> {
    let image = services::reorder(&state, &user, id, payload.display_order).await?;
    Ok(Json(services::to_response(&state, image)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    services::remove(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
