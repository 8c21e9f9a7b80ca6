use crate::state::AppState;
use axum::Router;

pub mod extractors;
pub mod firebase;
pub mod handlers;
pub mod identity;
pub mod policy;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
