mod admin;
mod app;
mod auth;
mod categories;
mod config;
mod db;
mod error;
mod extract;
mod favorites;
mod images;
mod jobs;
mod listings;
mod pagination;
mod patch;
mod reports;
mod reviews;
mod sales;
mod seed;
mod slug;
mod state;
mod storage;
#[cfg(all(test, feature = "db-test"))]
mod testing;
mod users;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "marketplace=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(env = ?config.env, "configuration loaded");

    let app_state = AppState::init(config).await?;
    db::migrate(&app_state.db).await?;

    if app_state.config.seed {
        if app_state.config.env.is_production() {
            tracing::warn!("SEED ignored in production");
        } else {
            seed::run(&app_state.db).await?;
        }
    }

    let _scheduler = jobs::Scheduler::new(app_state.clone()).await?.start().await?;

    app::serve(app::build_app(app_state)).await
}
