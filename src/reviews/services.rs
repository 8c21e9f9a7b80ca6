use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::repo;
use super::repo_types::Review;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::sales;
use crate::users::repo_types::User;

/// Only the recorded buyer may review a sale, once.
pub async fn create_review(db: &PgPool, caller: &User, sale_id: Uuid, rating: i32, comment: &str) -> ApiResult<Review> {
    let sale = sales::repo::find(db, sale_id)
        .await?
        .ok_or_else(|| ApiError::not_found("sale not found"))?;
    if sale.buyer_id.as_deref() != Some(caller.id.as_str()) {
        return Err(ApiError::forbidden("only the buyer can review this sale"));
    }
    match repo::insert(db, sale_id, rating, comment).await {
        Ok(review) => {
            info!(review_id = %review.id, %sale_id, rating, "review created");
            Ok(review)
        }
        Err(e) if is_unique_violation(&e, None) => Err(ApiError::conflict("sale already reviewed")),
        Err(e) => Err(e.into()),
    }
}
