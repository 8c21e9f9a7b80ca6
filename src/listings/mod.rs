use crate::state::AppState;
use axum::Router;

#[cfg(all(test, feature = "db-test"))]
mod db_tests;
pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::listing_routes()
}
