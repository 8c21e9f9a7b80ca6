use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSaleRequest {
    pub buyer_identifier: Option<String>,
    pub final_price: Option<f64>,
}

/// Validated sale input.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SaleInput {
    /// Email or slug of the buyer.
    pub buyer: Option<String>,
    /// Falls back to the listing price.
    pub final_price: Option<f64>,
}

impl CreateSaleRequest {
    pub fn validate(self) -> Result<SaleInput, ApiError> {
        if let Some(price) = self.final_price {
            if !price.is_finite() || price < 0.0 {
                return Err(ApiError::validation("final_price must be a non-negative number"));
            }
        }
        Ok(SaleInput {
            buyer: self
                .buyer_identifier
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty()),
            final_price: self.final_price,
        })
    }
}
