use serde::Deserialize;

use crate::error::ApiError;

pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

impl CreateReviewRequest {
    pub fn validate(self) -> Result<(i32, String), ApiError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::validation("rating must be between 1 and 5"));
        }
        let comment = self.comment.trim().to_string();
        if comment.chars().count() > MAX_COMMENT_LEN {
            return Err(ApiError::validation(format!(
                "comment must be at most {MAX_COMMENT_LEN} characters"
            )));
        }
        Ok((self.rating, comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        for rating in [0, 6, -1] {
            let req = CreateReviewRequest { rating, comment: String::new() };
            assert!(req.validate().is_err(), "{rating} accepted");
        }
        let ok = CreateReviewRequest { rating: 5, comment: " ótimo ".into() };
        assert_eq!(ok.validate().unwrap(), (5, "ótimo".to_string()));
    }

    #[test]
    fn comment_limit_counts_characters() {
        let at_limit = CreateReviewRequest { rating: 4, comment: "é".repeat(MAX_COMMENT_LEN) };
        assert!(at_limit.validate().is_ok());
        let over = CreateReviewRequest { rating: 4, comment: "a".repeat(MAX_COMMENT_LEN + 1) };
        assert!(over.validate().is_err());
    }
}
