use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// User record in the database. `id` is the identity provider's subject.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub slug: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub university: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram: Option<String>,
    pub verified: bool,
    pub role: Role,
    #[serde(skip_serializing)]
    pub deletion_requested_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fields for a first-sight insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub university: Option<String>,
}

/// Seller counters shown on a public profile.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SellerMetrics {
    pub is_verified: bool,
    pub profile_is_complete: bool,
    pub active_listings_count: i64,
    pub items_sold: i64,
    pub total_listings_count: i64,
    pub total_favorites_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
}

#[cfg(test)]
pub fn sample_user(id: &str, role: Role) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: id.to_string(),
        display_name: format!("User {id}"),
        slug: format!("user-{id}"),
        email: format!("{id}@usp.br"),
        photo_url: None,
        university: None,
        whatsapp: None,
        telegram: None,
        verified: true,
        role,
        deletion_requested_at: None,
        created_at: now,
        updated_at: now,
    }
}
