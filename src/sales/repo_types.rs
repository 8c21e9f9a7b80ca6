use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::reviews::repo_types::Review;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub seller_id: String,
    pub buyer_id: Option<String>,
    pub final_price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub sold_at: OffsetDateTime,
}

/// Sale joined with listing, parties and review.
#[derive(Debug, Clone, FromRow)]
pub struct SaleRow {
    #[sqlx(flatten)]
    pub sale: Sale,
    pub listing_title: String,
    pub listing_slug: String,
    pub listing_cover_key: Option<String>,
    pub seller_display_name: String,
    pub seller_slug: String,
    pub buyer_display_name: Option<String>,
    pub buyer_slug: Option<String>,
    pub review_id: Option<Uuid>,
    pub review_rating: Option<i32>,
    pub review_comment: Option<String>,
    pub review_created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub display_name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleListing {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub cover_src: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleView {
    #[serde(flatten)]
    pub sale: Sale,
    pub listing: SaleListing,
    pub seller: Party,
    pub buyer: Option<Party>,
    pub review: Option<Review>,
}

impl SaleView {
    /// `public_url` renders the cover image key.
    pub fn from_row(row: SaleRow, public_url: impl Fn(&str) -> String) -> Self {
        let buyer = match (row.buyer_display_name, row.buyer_slug) {
            (Some(display_name), Some(slug)) => Some(Party { display_name, slug }),
            _ => None,
        };
        let review = match (row.review_id, row.review_rating, row.review_created_at) {
            (Some(id), Some(rating), Some(created_at)) => Some(Review {
                id,
                sale_id: row.sale.id,
                rating,
                comment: row.review_comment.unwrap_or_default(),
                created_at,
            }),
            _ => None,
        };
        Self {
            listing: SaleListing {
                id: row.sale.listing_id,
                title: row.listing_title,
                slug: row.listing_slug,
                cover_src: row.listing_cover_key.as_deref().map(public_url),
            },
            seller: Party {
                display_name: row.seller_display_name,
                slug: row.seller_slug,
            },
            buyer,
            review,
            sale: row.sale,
        }
    }
}
