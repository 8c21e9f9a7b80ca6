use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{Sale, SaleRow};
use crate::listings::repo::LISTING_COLUMNS;
use crate::listings::repo_types::{Listing, ListingStatus};
use crate::pagination::Pagination;

const SALE_SELECT: &str = r#"
    SELECT s.id, s.listing_id, s.seller_id, s.buyer_id, s.final_price, s.sold_at,
           l.title AS listing_title,
           l.slug AS listing_slug,
           (SELECT i.storage_key
              FROM listing_images i
             WHERE i.listing_id = l.id
             ORDER BY i.display_order, i.id
             LIMIT 1) AS listing_cover_key,
           se.display_name AS seller_display_name,
           se.slug AS seller_slug,
           bu.display_name AS buyer_display_name,
           bu.slug AS buyer_slug,
           r.id AS review_id,
           r.rating AS review_rating,
           r.comment AS review_comment,
           r.created_at AS review_created_at
      FROM sales s
      JOIN listings l ON l.id = s.listing_id
      JOIN users se ON se.id = s.seller_id
      LEFT JOIN users bu ON bu.id = s.buyer_id
      LEFT JOIN reviews r ON r.sale_id = s.id
"#;

/// Lock the listing row until the transaction ends.
pub async fn lock_listing_tx(tx: &mut Transaction<'_, Postgres>, listing_id: Uuid) -> sqlx::Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>(&format!(
        "SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = $1 FOR UPDATE"
    ))
    .bind(listing_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn find_buyer_tx(tx: &mut Transaction<'_, Postgres>, identifier: &str) -> sqlx::Result<Option<String>> {
    crate::users::repo::find_id_by_identifier(&mut **tx, identifier).await
}

pub async fn mark_sold_tx(tx: &mut Transaction<'_, Postgres>, listing_id: Uuid) -> sqlx::Result<()> {
    crate::listings::repo::set_status(&mut **tx, listing_id, ListingStatus::Sold).await?;
    Ok(())
}

pub async fn insert_sale_tx(
    tx: &mut Transaction<'_, Postgres>,
    listing_id: Uuid,
    seller_id: &str,
    buyer_id: Option<&str>,
    final_price: f64,
) -> sqlx::Result<Sale> {
    sqlx::query_as::<_, Sale>(
        r#"
        INSERT INTO sales (listing_id, seller_id, buyer_id, final_price)
        VALUES ($1, $2, $3, $4)
        RETURNING id, listing_id, seller_id, buyer_id, final_price, sold_at
        "#,
    )
    .bind(listing_id)
    .bind(seller_id)
    .bind(buyer_id)
    .bind(final_price)
    .fetch_one(&mut **tx)
    .await
}

// ---- Queries ----

pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Sale>> {
    sqlx::query_as::<_, Sale>(
        "SELECT id, listing_id, seller_id, buyer_id, final_price, sold_at FROM sales WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_row(db: &PgPool, id: Uuid) -> sqlx::Result<Option<SaleRow>> {
    sqlx::query_as::<_, SaleRow>(&format!("{SALE_SELECT} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Which side of the sale the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buyer,
    Seller,
}

impl Side {
    fn column(self) -> &'static str {
        match self {
            Side::Buyer => "s.buyer_id",
            Side::Seller => "s.seller_id",
        }
    }
}

pub async fn list_for(db: &PgPool, side: Side, user_id: &str, p: Pagination) -> sqlx::Result<(Vec<SaleRow>, i64)> {
    let column = side.column();
    let rows = sqlx::query_as::<_, SaleRow>(&format!(
        "{SALE_SELECT} WHERE {column} = $1 ORDER BY s.sold_at DESC, s.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(p.limit())
    .bind(p.offset())
    .fetch_all(db)
    .await?;
    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT count(*) FROM sales s WHERE {column} = $1"))
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok((rows, total))
}
