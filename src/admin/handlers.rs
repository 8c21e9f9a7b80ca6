use axum::{
    extract::State,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, DashboardStats};
use crate::auth::extractors::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::listings::{self, repo_types::ListingStatus, repo_types::ListingView};
use crate::pagination::{Page, Pagination};
use crate::state::AppState;
use crate::users::{self, repo_types::Role, repo_types::User};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(get_stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/role", put(update_user_role))
        .route("/admin/listings/:id/status", put(update_listing_status))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingStatusRequest {
    pub status: ListingStatus,
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn get_stats(State(state): State<AppState>, AdminUser(admin): AdminUser) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(repo::stats(&state.db).await?))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    p: Pagination,
) -> ApiResult<Json<Page<User>>> {
    let (rows, total) = users::repo::list_page(&state.db, p).await?;
    Ok(Json(Page::new(rows, p, total)))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    if id == admin.id && payload.role != Role::Admin {
        return Err(ApiError::validation("admins cannot demote themselves"));
    }
    let user = users::repo::set_role(&state.db, &id, payload.role)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    info!(user_id = %id, role = ?user.role, "role updated");
    Ok(Json(user))
}

/// Moderation takes listings down or restores them. `sold` is reserved for
/// the sale transaction, and a listing with a sale cannot be made available.
pub fn check_moderation(target: ListingStatus, has_sale: bool) -> ApiResult<()> {
    match target {
        ListingStatus::Sold => Err(ApiError::validation("listings become sold only through a sale")),
        ListingStatus::Available if has_sale => Err(ApiError::conflict("listing already has a sale")),
        _ => Ok(()),
    }
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn update_listing_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateListingStatusRequest>,
) -> ApiResult<Json<ListingView>> {
    let has_sale = repo::listing_has_sale(&state.db, id).await?;
    check_moderation(payload.status, has_sale)?;
    listings::repo::set_status(&state.db, id, payload.status)
        .await?
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    info!(listing_id = %id, status = ?payload.status, "listing moderated");
    let row = listings::repo::find_row(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    Ok(Json(listings::services::hydrate_one(&state, row).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_rules() {
        assert!(check_moderation(ListingStatus::Deleted, true).is_ok());
        assert!(check_moderation(ListingStatus::Available, false).is_ok());
        assert!(matches!(
            check_moderation(ListingStatus::Available, true),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            check_moderation(ListingStatus::Sold, false),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn stats_use_camel_case() {
        let json = serde_json::to_value(DashboardStats {
            total_users: 3,
            active_listings: 2,
            listings_sold: 1,
            pending_reports: 0,
        })
        .unwrap();
        assert_eq!(json["totalUsers"], 3);
        assert_eq!(json["activeListings"], 2);
        assert_eq!(json["listingsSold"], 1);
        assert_eq!(json["pendingReports"], 0);
    }
}
