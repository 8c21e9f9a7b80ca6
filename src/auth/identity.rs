use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;

/// Profile fields held by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid credential: {0}")]
    InvalidToken(String),
    #[error("identity account not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidToken(_) => ApiError::unauthorized("invalid or expired token"),
            IdentityError::NotFound => ApiError::unauthorized("identity account not found"),
            IdentityError::Other(e) => ApiError::Internal(e),
        }
    }
}

/// Hosted identity service that owns user credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validates a bearer credential and returns the stable subject id.
    async fn verify(&self, token: &str) -> Result<String, IdentityError>;
    async fn get_profile(&self, subject: &str) -> Result<IdentityProfile, IdentityError>;
    async fn delete(&self, subject: &str) -> Result<(), IdentityError>;
}
