use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use super::services;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo_types::User;

/// Authenticated caller, provisioned on first sight.
pub struct AuthUser(pub User);

/// Authenticated caller with the admin role.
pub struct AdminUser(pub User);

/// Caller on public routes: `None` without an Authorization header. A header
/// that is present but invalid is still rejected.
pub struct MaybeUser(pub Option<User>);

/// Pulls the bearer token out of the Authorization header; `Ok(None)` when absent.
pub(crate) fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid Authorization header"))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("invalid auth scheme"))?;
    Ok(Some(token))
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, ApiError> {
    let subject = state.identity.verify(token).await?;
    let user = services::provision(state, &subject).await?;
    if user.deletion_requested_at.is_some() {
        debug!(user_id = %user.id, "rejecting user with pending deletion");
        return Err(ApiError::unauthorized("account deletion pending"));
    }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;
        authenticate(state, token).await.map(AuthUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("admin role required"));
        }
        Ok(AdminUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(MaybeUser(None)),
            Some(token) => authenticate(state, token).await.map(|u| MaybeUser(Some(u))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(auth: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/");
        if let Some(v) = auth {
            req = req.header(AUTHORIZATION, v);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(None)).unwrap(), None);
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))).unwrap(), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("bearer abc"))).unwrap(), Some("abc"));
        assert!(bearer_token(&parts(Some("Basic abc"))).is_err());
        assert!(bearer_token(&parts(Some("Bearer   "))).is_err());
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = AppState::fake();
        let err = AuthUser::from_request_parts(&mut parts(None), &state).await.err().unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized_even_on_public_routes() {
        let state = AppState::fake();
        let err = MaybeUser::from_request_parts(&mut parts(Some("Bearer nope")), &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn anonymous_caller_on_public_routes() {
        let state = AppState::fake();
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts(None), &state).await.ok().unwrap();
        assert!(user.is_none());
    }
}
