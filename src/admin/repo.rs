use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub active_listings: i64,
    pub listings_sold: i64,
    pub pending_reports: i64,
}

pub async fn stats(db: &PgPool) -> sqlx::Result<DashboardStats> {
    sqlx::query_as::<_, DashboardStats>(
        r#"
        SELECT (SELECT count(*) FROM users) AS total_users,
               (SELECT count(*) FROM listings WHERE status = 'available') AS active_listings,
               (SELECT count(*) FROM listings WHERE status = 'sold') AS listings_sold,
               (SELECT count(*) FROM reports WHERE status = 'open') AS pending_reports
        "#,
    )
    .fetch_one(db)
    .await
}

pub async fn listing_has_sale(db: &PgPool, listing_id: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM sales WHERE listing_id = $1)")
        .bind(listing_id)
        .fetch_one(db)
        .await
}
