use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use super::repo_types::{ListingCondition, ListingStatus, NewListing};
use crate::error::ApiError;
use crate::users::repo_types::User;

const TITLE_LEN: std::ops::RangeInclusive<usize> = 3..=100;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_KEYWORDS_LEN: usize = 255;
const MAX_LOCATION_LEN: usize = 120;

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub category_id: i32,
    pub title: String,
    #[serde(default)]
    pub keywords: String,
    pub description: String,
    pub price: f64,
    pub condition: ListingCondition,
    #[serde(default)]
    pub is_negotiable: bool,
    #[serde(default)]
    pub seller_can_deliver: bool,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateListingRequest {
    pub category_id: Option<i32>,
    pub title: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<ListingCondition>,
    pub is_negotiable: Option<bool>,
    pub seller_can_deliver: Option<bool>,
    pub location: Option<String>,
}

/// Validated listing changes; `None` keeps the stored value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingPatch {
    pub category_id: Option<i32>,
    pub title: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<ListingCondition>,
    pub is_negotiable: Option<bool>,
    pub seller_can_deliver: Option<bool>,
    pub location: Option<String>,
}

fn title(v: &str) -> Result<String, ApiError> {
    let v = v.trim();
    if !TITLE_LEN.contains(&v.chars().count()) {
        return Err(ApiError::validation(format!(
            "title must be {} to {} characters",
            TITLE_LEN.start(),
            TITLE_LEN.end()
        )));
    }
    Ok(v.to_string())
}

fn description(v: &str) -> Result<String, ApiError> {
    let v = v.trim();
    if v.is_empty() || v.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::validation(format!(
            "description must be 1 to {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(v.to_string())
}

fn bounded(field: &str, v: &str, max: usize) -> Result<String, ApiError> {
    let v = v.trim();
    if v.chars().count() > max {
        return Err(ApiError::validation(format!("{field} must be at most {max} characters")));
    }
    Ok(v.to_string())
}

/// Collapses whitespace so the stored value is the space-separated form search expects.
fn keywords(v: &str) -> Result<String, ApiError> {
    let joined = v.split_whitespace().collect::<Vec<_>>().join(" ");
    bounded("keywords", &joined, MAX_KEYWORDS_LEN)
}

fn price(v: f64) -> Result<f64, ApiError> {
    if !v.is_finite() || v < 0.0 {
        return Err(ApiError::validation("price must be a non-negative number"));
    }
    Ok(v)
}

impl CreateListingRequest {
    pub fn validate(self) -> Result<NewListing, ApiError> {
        Ok(NewListing {
            category_id: self.category_id,
            title: title(&self.title)?,
            keywords: keywords(&self.keywords)?,
            description: description(&self.description)?,
            price: price(self.price)?,
            condition: self.condition,
            is_negotiable: self.is_negotiable,
            seller_can_deliver: self.seller_can_deliver,
            location: bounded("location", &self.location, MAX_LOCATION_LEN)?,
        })
    }
}

impl UpdateListingRequest {
    pub fn validate(self) -> Result<ListingPatch, ApiError> {
        Ok(ListingPatch {
            category_id: self.category_id,
            title: self.title.as_deref().map(title).transpose()?,
            keywords: self.keywords.as_deref().map(keywords).transpose()?,
            description: self.description.as_deref().map(description).transpose()?,
            price: self.price.map(price).transpose()?,
            condition: self.condition,
            is_negotiable: self.is_negotiable,
            seller_can_deliver: self.seller_can_deliver,
            location: self
                .location
                .as_deref()
                .map(|v| bounded("location", v, MAX_LOCATION_LEN))
                .transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFilter {
    category_id: Option<String>,
    status: Option<String>,
    q: Option<String>,
}

/// Browse filters from `?category_id=&status=&q=`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingFilter {
    pub category_id: Option<i32>,
    pub status: Option<ListingStatus>,
    pub q: Option<String>,
}

impl ListingFilter {
    fn parse(raw: RawFilter) -> Result<Self, ApiError> {
        let category_id = match raw.category_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) => Some(
                v.parse::<i32>()
                    .map_err(|_| ApiError::validation("category_id must be an integer"))?,
            ),
        };
        let status = match raw.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) => Some(v.parse::<ListingStatus>().map_err(ApiError::validation)?),
        };
        let q = raw.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
        Ok(Self { category_id, status, q })
    }

    /// Status restriction for `caller`: admins get what they asked for (all
    /// statuses when unset), everyone else only sees available listings.
    pub fn visible_status(&self, caller: Option<&User>) -> Option<ListingStatus> {
        match caller {
            Some(u) if u.is_admin() => self.status,
            _ => Some(ListingStatus::Available),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ListingFilter
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawFilter>::try_from_uri(&parts.uri)
            .map_err(|_| ApiError::validation("invalid query string"))?;
        ListingFilter::parse(raw)
    }
}
