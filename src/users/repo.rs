use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};

use super::dto::UserPatch;
use super::repo_types::{NewUser, Role, SellerMetrics, User};
use crate::pagination::Pagination;

pub const USER_COLUMNS: &str = "id, display_name, slug, email, photo_url, university, whatsapp, \
     telegram, verified, role, deletion_requested_at, created_at, updated_at";

pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// User by slug. A user pending deletion is treated as absent.
pub async fn find_visible_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE slug = $1 AND deletion_requested_at IS NULL"
    ))
    .bind(slug)
    .fetch_optional(db)
    .await
}

/// Resolves an email or a slug to a user id.
pub async fn find_id_by_identifier<'e>(db: impl PgExecutor<'e>, identifier: &str) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT id
          FROM users
         WHERE (lower(email) = lower($1) OR slug = $1)
           AND deletion_requested_at IS NULL
         LIMIT 1
        "#,
    )
    .bind(identifier)
    .fetch_optional(db)
    .await
}

pub async fn slug_exists(db: &PgPool, slug: &str) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE slug = $1)")
        .bind(slug)
        .fetch_one(db)
        .await
}

pub async fn insert(db: &PgPool, new: &NewUser, slug: &str) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, display_name, slug, email, photo_url, university)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&new.id)
    .bind(&new.display_name)
    .bind(slug)
    .bind(&new.email)
    .bind(&new.photo_url)
    .bind(&new.university)
    .fetch_one(db)
    .await
}

/// Copies identity-provider profile fields onto an existing row.
pub async fn sync_profile(
    db: &PgPool,
    id: &str,
    display_name: &str,
    photo_url: Option<&str>,
    university: Option<&str>,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
           SET display_name = $2, photo_url = $3, university = $4, updated_at = now()
         WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(display_name)
    .bind(photo_url)
    .bind(university)
    .fetch_one(db)
    .await
}

pub async fn apply_patch(db: &PgPool, id: &str, patch: UserPatch) -> sqlx::Result<User> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = now()");
    if let Some(v) = patch.photo_url {
        qb.push(", photo_url = ").push_bind(v);
    }
    if let Some(v) = patch.whatsapp {
        qb.push(", whatsapp = ").push_bind(v);
    }
    if let Some(v) = patch.telegram {
        qb.push(", telegram = ").push_bind(v);
    }
    if let Some(v) = patch.verified {
        qb.push(", verified = ").push_bind(v);
    }
    qb.push(" WHERE id = ")
        .push_bind(id.to_string())
        .push(" RETURNING ")
        .push(USER_COLUMNS);
    qb.build_query_as::<User>().fetch_one(db).await
}

pub async fn metrics_by_slug(db: &PgPool, slug: &str) -> sqlx::Result<Option<SellerMetrics>> {
    sqlx::query_as::<_, SellerMetrics>(
        r#"
        SELECT u.verified AS is_verified,
               (coalesce(u.whatsapp, '') <> '' OR coalesce(u.telegram, '') <> '') AS profile_is_complete,
               (SELECT count(*) FROM listings l WHERE l.user_id = u.id AND l.status = 'available') AS active_listings_count,
               (SELECT count(*) FROM listings l WHERE l.user_id = u.id AND l.status = 'sold') AS items_sold,
               (SELECT count(*) FROM listings l WHERE l.user_id = u.id AND l.status <> 'deleted') AS total_listings_count,
               (SELECT count(*)
                  FROM favorites f
                  JOIN listings l ON l.id = f.listing_id
                 WHERE l.user_id = u.id) AS total_favorites_count,
               u.created_at AS member_since
          FROM users u
         WHERE u.slug = $1 AND u.deletion_requested_at IS NULL
        "#,
    )
    .bind(slug)
    .fetch_optional(db)
    .await
}

pub async fn mark_deletion_requested(db: &PgPool, id: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE users SET deletion_requested_at = coalesce(deletion_requested_at, now()) WHERE id = $1",
    )
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn list_pending_deletion(db: &PgPool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM users WHERE deletion_requested_at IS NOT NULL ORDER BY deletion_requested_at",
    )
    .fetch_all(db)
    .await
}

/// Removes a user together with their listings, the listings' images and
/// favorites, and the user's own favorites. Sales of those listings and their
/// reviews follow through foreign-key cascades.
pub async fn delete_cascade(db: &PgPool, id: &str) -> sqlx::Result<bool> {
    let mut tx = db.begin().await?;

    sqlx::query(
        "DELETE FROM listing_images WHERE listing_id IN (SELECT id FROM listings WHERE user_id = $1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM favorites WHERE listing_id IN (SELECT id FROM listings WHERE user_id = $1)")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM favorites WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM listings WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted > 0)
}

pub async fn list_page(db: &PgPool, p: Pagination) -> sqlx::Result<(Vec<User>, i64)> {
    let rows = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
    ))
    .bind(p.limit())
    .bind(p.offset())
    .fetch_all(db)
    .await?;
    let total = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM users")
        .fetch_one(db)
        .await?;
    Ok((rows, total))
}

pub async fn set_role(db: &PgPool, id: &str, role: Role) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(role)
    .fetch_optional(db)
    .await
}
