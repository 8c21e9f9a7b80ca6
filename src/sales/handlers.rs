use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::CreateSaleRequest;
use super::repo::{self, Side};
use super::repo_types::{Sale, SaleView};
use super::services;
use crate::auth::extractors::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::pagination::{Page, Pagination};
use crate::state::AppState;

pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/listings/:id/sell", post(create_sale))
        .route("/sales/buyer", get(list_purchases))
        .route("/sales/seller", get(list_sales))
        .route("/sales/:id", get(get_sale))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_sale(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(listing_id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    let input = parse_body(&body)?.validate()?;
    let sale = services::create_sale(&state.db, &user, listing_id, input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// The sale body is optional; an empty body sells at list price without a buyer.
fn parse_body(body: &[u8]) -> ApiResult<CreateSaleRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateSaleRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::validation(format!("invalid sale body: {e}")))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_sale(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SaleView>> {
    let row = repo::find_row(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("sale not found"))?;
    services::ensure_participant(&row.sale, &user)?;
    Ok(Json(SaleView::from_row(row, |k| state.storage.public_url(k))))
}

async fn list_side(state: &AppState, side: Side, user_id: &str, p: Pagination) -> ApiResult<Json<Page<SaleView>>> {
    let (rows, total) = repo::list_for(&state.db, side, user_id, p).await?;
    let page = Page::new(rows, p, total).map(|row| SaleView::from_row(row, |k| state.storage.public_url(k)));
    Ok(Json(page))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_purchases(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    p: Pagination,
) -> ApiResult<Json<Page<SaleView>>> {
    list_side(&state, Side::Buyer, &user.id, p).await
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_sales(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    p: Pagination,
) -> ApiResult<Json<Page<SaleView>>> {
    list_side(&state, Side::Seller, &user.id, p).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_default_sale() {
        let req = parse_body(b"").unwrap();
        assert!(req.buyer_identifier.is_none());
        assert!(req.final_price.is_none());
    }

    #[test]
    fn json_body_is_parsed_and_garbage_rejected() {
        let req = parse_body(br#"{"buyer_identifier":"bob@usp.br","final_price":90}"#).unwrap();
        assert_eq!(req.buyer_identifier.as_deref(), Some("bob@usp.br"));
        assert_eq!(req.final_price, Some(90.0));
        assert!(matches!(parse_body(b"{nope"), Err(ApiError::Validation(_))));
    }
}
