use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ListingImage {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub storage_key: String,
    pub display_order: i32,
}

/// Image together with the user id owning its listing.
#[derive(Debug, Clone, FromRow)]
pub struct OwnedImage {
    #[sqlx(flatten)]
    pub image: ListingImage,
    pub owner_id: String,
}

/// Lock the parent listing row and return its owner and image count.
pub async fn lock_listing_tx(
    tx: &mut Transaction<'_, Postgres>,
    listing_id: Uuid,
) -> sqlx::Result<Option<(String, i64)>> {
    let owner = sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM listings WHERE id = $1 AND status <> 'deleted' FOR UPDATE",
    )
    .bind(listing_id)
    .fetch_optional(&mut **tx)
    .await?;
    let Some(owner) = owner else {
        return Ok(None);
    };
    let count = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM listing_images WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(Some((owner, count)))
}

/// Insert an image within a transaction. Without an explicit order the image
/// goes after the current last one.
pub async fn insert_image_tx(
    tx: &mut Transaction<'_, Postgres>,
    listing_id: Uuid,
    storage_key: &str,
    display_order: Option<i32>,
) -> sqlx::Result<ListingImage> {
    sqlx::query_as::<_, ListingImage>(
        r#"
        INSERT INTO listing_images (listing_id, storage_key, display_order)
        VALUES ($1, $2, COALESCE($3, (SELECT COALESCE(MAX(display_order) + 1, 0)
                                        FROM listing_images
                                       WHERE listing_id = $1)))
        RETURNING id, listing_id, storage_key, display_order
        "#,
    )
    .bind(listing_id)
    .bind(storage_key)
    .bind(display_order)
    .fetch_one(&mut **tx)
    .await
}

// ---- Queries ----

pub async fn list_by_listing(db: &PgPool, listing_id: Uuid) -> sqlx::Result<Vec<ListingImage>> {
    sqlx::query_as::<_, ListingImage>(
        r#"
        SELECT id, listing_id, storage_key, display_order
          FROM listing_images
         WHERE listing_id = $1
         ORDER BY display_order ASC, id ASC
        "#,
    )
    .bind(listing_id)
    .fetch_all(db)
    .await
}

/// Images of several listings at once, grouped by listing and ordered.
pub async fn list_for_listings(db: &PgPool, listing_ids: &[Uuid]) -> sqlx::Result<Vec<ListingImage>> {
    if listing_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, ListingImage>(
        r#"
        SELECT id, listing_id, storage_key, display_order
          FROM listing_images
         WHERE listing_id = ANY($1)
         ORDER BY listing_id, display_order ASC, id ASC
        "#,
    )
    .bind(listing_ids)
    .fetch_all(db)
    .await
}

pub async fn find_owned(db: &PgPool, id: Uuid) -> sqlx::Result<Option<OwnedImage>> {
    sqlx::query_as::<_, OwnedImage>(
        r#"
        SELECT i.id, i.listing_id, i.storage_key, i.display_order, l.user_id AS owner_id
          FROM listing_images i
          JOIN listings l ON l.id = i.listing_id
         WHERE i.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn update_order(db: &PgPool, id: Uuid, display_order: i32) -> sqlx::Result<ListingImage> {
    sqlx::query_as::<_, ListingImage>(
        r#"
        UPDATE listing_images
           SET display_order = $2
         WHERE id = $1
        RETURNING id, listing_id, storage_key, display_order
        "#,
    )
    .bind(id)
    .bind(display_order)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM listing_images WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Every stored key, for reconciliation against the bucket.
pub async fn all_keys(db: &PgPool) -> anyhow::Result<Vec<(Uuid, String)>> {
    sqlx::query_as::<_, (Uuid, String)>("SELECT id, storage_key FROM listing_images")
        .fetch_all(db)
        .await
        .context("list image keys")
}

pub async fn delete_many(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM listing_images WHERE id = ANY($1)")
        .bind(ids)
        .execute(db)
        .await
        .context("delete image rows")?;
    Ok(res.rows_affected())
}
