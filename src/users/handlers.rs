use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use tracing::{info, instrument};

use super::dto::{IsOwnerResponse, PublicProfile, UpdateMeRequest};
use super::repo;
use super::repo_types::{SellerMetrics, User};
use super::services;
use crate::auth::extractors::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::state::AppState;

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me).put(update_me).delete(delete_me))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/:slug", get(get_profile))
        .route("/profile/:slug/is-owner", get(is_owner))
        .route("/profile/:slug/metrics", get(get_metrics))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateMeRequest>,
) -> ApiResult<Json<User>> {
    let patch = payload.validate()?;
    let updated = repo::apply_patch(&state.db, &user.id, patch).await?;
    info!("profile updated");
    Ok(Json(updated))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_me(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<StatusCode> {
    services::delete_account(&state, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn load_visible(state: &AppState, slug: &str) -> ApiResult<User> {
    repo::find_visible_by_slug(&state.db, slug)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))
}

#[instrument(skip(state))]
pub async fn get_profile(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<PublicProfile>> {
    let user = load_visible(&state, &slug).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn is_owner(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<IsOwnerResponse>> {
    let profile = load_visible(&state, &slug).await?;
    Ok(Json(IsOwnerResponse {
        is_owner: profile.id == user.id,
    }))
}

#[instrument(skip(state))]
pub async fn get_metrics(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<SellerMetrics>> {
    repo::metrics_by_slug(&state.db, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user not found"))
}
