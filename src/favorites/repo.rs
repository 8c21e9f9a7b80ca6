use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::listings::repo_types::ListingRow;
use crate::pagination::Pagination;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Favorite {
    pub user_id: String,
    pub listing_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct FavoriteRow {
    #[sqlx(flatten)]
    pub listing: ListingRow,
    pub favorited_at: OffsetDateTime,
}

pub async fn insert(db: &PgPool, user_id: &str, listing_id: Uuid) -> sqlx::Result<Favorite> {
    sqlx::query_as::<_, Favorite>(
        r#"
        INSERT INTO favorites (user_id, listing_id)
        VALUES ($1, $2)
        RETURNING user_id, listing_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(listing_id)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, user_id: &str, listing_id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND listing_id = $2")
        .bind(user_id)
        .bind(listing_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// The user's favorites, newest first. Deleted listings drop out.
pub async fn list_for_user(db: &PgPool, user_id: &str, p: Pagination) -> sqlx::Result<(Vec<FavoriteRow>, i64)> {
    let rows = sqlx::query_as::<_, FavoriteRow>(
        r#"
        SELECT l.id, l.user_id, l.category_id, l.title, l.keywords, l.slug,
               l.description, l.price, l.condition, l.is_negotiable, l.seller_can_deliver,
               l.location, l.status, l.created_at, l.updated_at,
               u.display_name AS seller_display_name,
               u.slug AS seller_slug,
               u.photo_url AS seller_photo_url,
               u.university AS seller_university,
               u.verified AS seller_verified,
               c.name AS category_name,
               c.parent_id AS category_parent_id,
               f.created_at AS favorited_at
          FROM favorites f
          JOIN listings l ON l.id = f.listing_id
          JOIN users u ON u.id = l.user_id
          JOIN categories c ON c.id = l.category_id
         WHERE f.user_id = $1 AND l.status <> 'deleted'
         ORDER BY f.created_at DESC, l.id DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(p.limit())
    .bind(p.offset())
    .fetch_all(db)
    .await?;
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT count(*)
          FROM favorites f
          JOIN listings l ON l.id = f.listing_id
         WHERE f.user_id = $1 AND l.status <> 'deleted'
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok((rows, total))
}
