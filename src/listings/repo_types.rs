use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::categories::repo::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "listing_condition", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingCondition {
    New,
    Used,
    Refurbished,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "listing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Sold,
    Deleted,
}

impl std::str::FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "sold" => Ok(Self::Sold),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown listing status: {other}")),
        }
    }
}

/// Row of the `listings` table.
#[derive(Debug, Clone, FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub user_id: String,
    pub category_id: i32,
    pub title: String,
    pub keywords: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    pub condition: ListingCondition,
    pub is_negotiable: bool,
    pub seller_can_deliver: bool,
    pub location: String,
    pub status: ListingStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Listing joined with its seller and category.
#[derive(Debug, Clone, FromRow)]
pub struct ListingRow {
    #[sqlx(flatten)]
    pub listing: Listing,
    pub seller_display_name: String,
    pub seller_slug: String,
    pub seller_photo_url: Option<String>,
    pub seller_university: Option<String>,
    pub seller_verified: bool,
    pub category_name: String,
    pub category_parent_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SellerSummary {
    pub display_name: String,
    pub slug: String,
    pub photo_url: Option<String>,
    pub university: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub id: Uuid,
    pub src: String,
    pub display_order: i32,
}

/// Listing as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    pub id: Uuid,
    pub user_id: String,
    pub category_id: i32,
    pub title: String,
    pub keywords: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    pub condition: ListingCondition,
    pub is_negotiable: bool,
    pub seller_can_deliver: bool,
    pub location: String,
    pub status: ListingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: SellerSummary,
    pub category: Category,
    pub images: Vec<ImageView>,
}

impl ListingView {
    pub fn from_row(row: ListingRow, images: Vec<ImageView>) -> Self {
        let l = row.listing;
        Self {
            id: l.id,
            user_id: l.user_id,
            category_id: l.category_id,
            title: l.title,
            keywords: l.keywords,
            slug: l.slug,
            description: l.description,
            price: l.price,
            condition: l.condition,
            is_negotiable: l.is_negotiable,
            seller_can_deliver: l.seller_can_deliver,
            location: l.location,
            status: l.status,
            created_at: l.created_at,
            updated_at: l.updated_at,
            user: SellerSummary {
                display_name: row.seller_display_name,
                slug: row.seller_slug,
                photo_url: row.seller_photo_url,
                university: row.seller_university,
                verified: row.seller_verified,
            },
            category: Category {
                id: l.category_id,
                name: row.category_name,
                parent_id: row.category_parent_id,
            },
            images,
        }
    }
}

/// Validated fields for an insert.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub category_id: i32,
    pub title: String,
    pub keywords: String,
    pub description: String,
    pub price: f64,
    pub condition: ListingCondition,
    pub is_negotiable: bool,
    pub seller_can_deliver: bool,
    pub location: String,
}
