use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub rating: i32,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Review with the sale context it belongs to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub listing_id: Uuid,
    pub listing_title: String,
    pub listing_slug: String,
    pub seller_display_name: String,
    pub seller_slug: String,
    pub reviewer_display_name: Option<String>,
    pub reviewer_slug: Option<String>,
}
