use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, Favorite};
use crate::auth::extractors::AuthUser;
use crate::error::{is_foreign_key_violation, is_unique_violation, ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::listings::{self, repo_types::ListingStatus, repo_types::ListingView};
use crate::pagination::{Page, Pagination};
use crate::state::AppState;

pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/:listing_id", delete(remove_favorite))
}

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub listing_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FavoriteView {
    #[serde(with = "time::serde::rfc3339")]
    pub favorited_at: OffsetDateTime,
    pub listing: ListingView,
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<AddFavoriteRequest>,
) -> ApiResult<(StatusCode, Json<Favorite>)> {
    let listing_id = payload.listing_id;
    listings::repo::find(&state.db, listing_id)
        .await?
        .filter(|l| l.status != ListingStatus::Deleted)
        .ok_or_else(|| ApiError::not_found("listing not found"))?;

    match repo::insert(&state.db, &user.id, listing_id).await {
        Ok(fav) => {
            info!(%listing_id, "listing favorited");
            Ok((StatusCode::CREATED, Json(fav)))
        }
        Err(e) if is_unique_violation(&e, None) => Err(ApiError::conflict("listing already in favorites")),
        Err(e) if is_foreign_key_violation(&e) => Err(ApiError::not_found("listing not found")),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_favorites(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    p: Pagination,
) -> ApiResult<Json<Page<FavoriteView>>> {
    let (rows, total) = repo::list_for_user(&state.db, &user.id, p).await?;
    let stamps: Vec<OffsetDateTime> = rows.iter().map(|r| r.favorited_at).collect();
    let views = listings::services::hydrate(&state, rows.into_iter().map(|r| r.listing).collect()).await?;
    let data = stamps
        .into_iter()
        .zip(views)
        .map(|(favorited_at, listing)| FavoriteView { favorited_at, listing })
        .collect();
    Ok(Json(Page::new(data, p, total)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !repo::delete(&state.db, &user.id, listing_id).await? {
        return Err(ApiError::not_found("favorite not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
