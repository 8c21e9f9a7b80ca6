use axum::{extract::State, http::request::Parts, routing::post, Router};
use serde::Serialize;
use tracing::{info, instrument};

use super::extractors::bearer_token;
use super::services;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::state::AppState;
use crate::users::repo_types::User;

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
}

/// Bearer token taken without provisioning; login does that itself.
pub struct LoginToken(pub String);

#[axum::async_trait]
impl axum::extract::FromRequestParts<AppState> for LoginToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        bearer_token(parts)?
            .map(|t| LoginToken(t.to_string()))
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))
    }
}

#[instrument(skip(state, token))]
pub async fn login(State(state): State<AppState>, LoginToken(token): LoginToken) -> ApiResult<Json<LoginResponse>> {
    let subject = state.identity.verify(&token).await?;
    let user = services::login(&state, &subject).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse { user }))
}
