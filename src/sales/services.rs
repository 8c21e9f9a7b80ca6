use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::SaleInput;
use super::repo;
use super::repo_types::Sale;
use crate::auth::policy::ensure_owner;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::listings::repo_types::ListingStatus;
use crate::users::repo_types::User;

/// Sells `listing_id` in one transaction holding the listing's row lock.
///
/// A concurrent second attempt blocks on the lock, then sees the listing as
/// sold and fails with a conflict. Any error rolls the transaction back.
pub async fn create_sale(db: &PgPool, caller: &User, listing_id: Uuid, input: SaleInput) -> ApiResult<Sale> {
    let mut tx = db.begin().await?;

    let listing = repo::lock_listing_tx(&mut tx, listing_id)
        .await?
        .filter(|l| l.status != ListingStatus::Deleted)
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    ensure_owner(&listing.user_id, caller)?;
    if listing.status != ListingStatus::Available {
        warn!(%listing_id, status = ?listing.status, "sale attempted on unavailable listing");
        return Err(ApiError::conflict("listing not available for sale"));
    }

    let buyer_id = match input.buyer.as_deref() {
        Some(identifier) => {
            let id = repo::find_buyer_tx(&mut tx, identifier)
                .await?
                .ok_or_else(|| ApiError::not_found("buyer not found"))?;
            if id == listing.user_id {
                return Err(ApiError::validation("seller cannot be the buyer"));
            }
            Some(id)
        }
        None => None,
    };

    let final_price = input.final_price.unwrap_or(listing.price);
    repo::mark_sold_tx(&mut tx, listing_id).await?;
    let sale = match repo::insert_sale_tx(&mut tx, listing_id, &listing.user_id, buyer_id.as_deref(), final_price).await {
        Ok(sale) => sale,
        Err(e) if is_unique_violation(&e, None) => {
            return Err(ApiError::conflict("listing not available for sale"));
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;

    info!(sale_id = %sale.id, %listing_id, buyer = ?sale.buyer_id, final_price, "listing sold");
    Ok(sale)
}

/// Participants and admins may read a sale.
pub fn ensure_participant(sale: &Sale, caller: &User) -> ApiResult<()> {
    let is_party = sale.seller_id == caller.id || sale.buyer_id.as_deref() == Some(caller.id.as_str());
    if is_party || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("you are not part of this sale"))
    }
}
