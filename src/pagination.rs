use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Validated, 1-indexed page request taken from `?page=&pageSize=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPagination {
    page: Option<String>,
    #[serde(rename = "pageSize")]
    page_size: Option<String>,
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Result<Self, ApiError> {
        if page < 1 {
            return Err(ApiError::validation("page must be >= 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ApiError::validation(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| ApiError::validation("page out of range"))?;
        Ok(Self {
            page,
            page_size,
            offset,
        })
    }

    fn parse(raw: RawPagination) -> Result<Self, ApiError> {
        let page = parse_field("page", raw.page, 1)?;
        let page_size = parse_field("pageSize", raw.page_size, DEFAULT_PAGE_SIZE)?;
        Self::new(page, page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

fn parse_field(name: &str, raw: Option<String>, default: i64) -> Result<i64, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v
            .parse::<i64>()
            .map_err(|_| ApiError::validation(format!("{name} must be an integer"))),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawPagination>::try_from_uri(&parts.uri)
            .map_err(|_| ApiError::validation("invalid query string"))?;
        Pagination::parse(raw)
    }
}

/// List envelope: `{data, page, pageSize, total}`.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, p: Pagination, total: i64) -> Self {
        Self {
            data,
            page: p.page,
            page_size: p.page_size,
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(uri: &str) -> Result<Pagination, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Pagination::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn defaults_to_first_page_of_twenty() {
        let p = extract("/listings").await.unwrap();
        assert_eq!(p, Pagination::default());
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 20);
    }

    #[tokio::test]
    async fn second_page_of_five_skips_five() {
        let p = extract("/listings?page=2&pageSize=5&q=ignored").await.unwrap();
        assert_eq!(p, Pagination::new(2, 5).unwrap());
        assert_eq!((p.page, p.page_size), (2, 5));
        assert_eq!(p.offset(), 5);
        assert_eq!(p.limit(), 5);
    }

    #[tokio::test]
    async fn rejects_zero_and_garbage() {
        for uri in [
            "/listings?page=0",
            "/listings?pageSize=0",
            "/listings?page=-3",
            "/listings?page=abc",
            "/listings?pageSize=1000",
        ] {
            let err = extract(uri).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{uri} should be rejected");
        }
    }

    #[tokio::test]
    async fn huge_page_is_rejected_not_overflowed() {
        let err = extract("/listings?page=9223372036854775807&pageSize=100")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let last = Pagination::new(i64::MAX / 100, 100).unwrap();
        assert!(last.offset() >= 0);
    }

    #[test]
    fn envelope_uses_camel_case_page_size() {
        let page = Page::new(vec![1, 2], Pagination::default(), 7).map(|n| n * 10);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!([10, 20]));
        assert_eq!(json["pageSize"], 20);
        assert_eq!(json["page"], 1);
        assert_eq!(json["total"], 7);
    }
}
