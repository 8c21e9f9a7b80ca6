use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateListingRequest, ListingFilter, UpdateListingRequest};
use super::repo::{self, ListingScope};
use super::repo_types::{ListingRow, ListingView};
use super::services;
use crate::auth::extractors::{AuthUser, MaybeUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::pagination::{Page, Pagination};
use crate::state::AppState;
use crate::users;

pub fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/listings", get(list_listings).post(create_listing))
        .route("/listings/search", get(search_listings))
        .route("/listings/slug/:slug", get(get_listing_by_slug))
        .route("/listings/user/:user_slug", get(list_user_listings))
        .route(
            "/listings/:id",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
}

async fn page_of(
    state: &AppState,
    scope: &ListingScope,
    p: Pagination,
) -> ApiResult<Json<Page<ListingView>>> {
    let (rows, total) = repo::list_page(&state.db, scope, p).await?;
    let views = services::hydrate(state, rows).await?;
    Ok(Json(Page::new(views, p, total)))
}

#[instrument(skip(state, caller))]
pub async fn list_listings(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    p: Pagination,
    filter: ListingFilter,
) -> ApiResult<Json<Page<ListingView>>> {
    let scope = services::browse_scope(&filter, caller.as_ref());
    page_of(&state, &scope, p).await
}

#[instrument(skip(state, caller))]
pub async fn search_listings(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    p: Pagination,
    filter: ListingFilter,
) -> ApiResult<Json<Page<ListingView>>> {
    let q = filter
        .q
        .clone()
        .ok_or_else(|| ApiError::validation("query parameter q is required"))?;
    let scope = ListingScope {
        search: Some(q),
        ..services::browse_scope(&filter, caller.as_ref())
    };
    page_of(&state, &scope, p).await
}

#[instrument(skip(state, caller))]
pub async fn list_user_listings(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Path(user_slug): Path<String>,
    p: Pagination,
    filter: ListingFilter,
) -> ApiResult<Json<Page<ListingView>>> {
    let seller = users::repo::find_visible_by_slug(&state.db, &user_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    let scope = services::seller_scope(&seller, &filter, caller.as_ref());
    page_of(&state, &scope, p).await
}

async fn visible(state: &AppState, row: Option<ListingRow>, caller: Option<&users::repo_types::User>) -> ApiResult<Json<ListingView>> {
    let row = row
        .filter(|r| services::can_view(&r.listing, caller))
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    Ok(Json(services::hydrate_one(state, row).await?))
}

#[instrument(skip(state, caller))]
pub async fn get_listing(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListingView>> {
    let row = repo::find_row(&state.db, id).await?;
    visible(&state, row, caller.as_ref()).await
}

#[instrument(skip(state, caller))]
pub async fn get_listing_by_slug(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<ListingView>> {
    let row = repo::find_row_by_slug(&state.db, &slug).await?;
    visible(&state, row, caller.as_ref()).await
}

async fn reload(state: &AppState, id: Uuid) -> ApiResult<Json<ListingView>> {
    let row = repo::find_row(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    Ok(Json(services::hydrate_one(state, row).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_listing(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateListingRequest>,
) -> ApiResult<(StatusCode, Json<ListingView>)> {
    let new = payload.validate()?;
    let listing = services::create(&state, &user, new).await?;
    Ok((StatusCode::CREATED, reload(&state, listing.id).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_listing(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateListingRequest>,
) -> ApiResult<Json<ListingView>> {
    let patch = payload.validate()?;
    services::update(&state, &user, id, patch).await?;
    reload(&state, id).await
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_listing(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    services::delete(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
