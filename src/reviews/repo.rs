use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Review, ReviewView};
use crate::pagination::Pagination;

const VIEW_SELECT: &str = r#"
    SELECT r.id, r.sale_id, r.rating, r.comment, r.created_at,
           l.id AS listing_id,
           l.title AS listing_title,
           l.slug AS listing_slug,
           se.display_name AS seller_display_name,
           se.slug AS seller_slug,
           bu.display_name AS reviewer_display_name,
           bu.slug AS reviewer_slug
      FROM reviews r
      JOIN sales s ON s.id = r.sale_id
      JOIN listings l ON l.id = s.listing_id
      JOIN users se ON se.id = s.seller_id
      LEFT JOIN users bu ON bu.id = s.buyer_id
"#;

pub async fn insert(db: &PgPool, sale_id: Uuid, rating: i32, comment: &str) -> sqlx::Result<Review> {
    sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (sale_id, rating, comment)
        VALUES ($1, $2, $3)
        RETURNING id, sale_id, rating, comment, created_at
        "#,
    )
    .bind(sale_id)
    .bind(rating)
    .bind(comment)
    .fetch_one(db)
    .await
}

/// Reviews a user received as seller.
pub async fn list_received(db: &PgPool, user_id: &str, p: Pagination) -> sqlx::Result<(Vec<ReviewView>, i64)> {
    list_where(db, "s.seller_id", user_id, p).await
}

/// Reviews a user wrote as buyer.
pub async fn list_sent(db: &PgPool, user_id: &str, p: Pagination) -> sqlx::Result<(Vec<ReviewView>, i64)> {
    list_where(db, "s.buyer_id", user_id, p).await
}

async fn list_where(db: &PgPool, column: &str, user_id: &str, p: Pagination) -> sqlx::Result<(Vec<ReviewView>, i64)> {
    let rows = sqlx::query_as::<_, ReviewView>(&format!(
        "{VIEW_SELECT} WHERE {column} = $1 ORDER BY r.created_at DESC, r.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(p.limit())
    .bind(p.offset())
    .fetch_all(db)
    .await?;
    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT count(*) FROM reviews r JOIN sales s ON s.id = r.sale_id WHERE {column} = $1"
    ))
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok((rows, total))
}
