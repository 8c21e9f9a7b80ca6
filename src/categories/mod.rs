use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod tree;

pub fn router() -> Router<AppState> {
    handlers::category_routes()
}
