use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{admin, auth, categories, favorites, images, listings, reports, reviews, sales, users};

pub const DEV_ORIGIN: &str = "http://localhost:3000";

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(categories::router())
                .merge(listings::router())
                .merge(images::router())
                .merge(favorites::router())
                .merge(sales::router())
                .merge(reviews::router())
                .merge(reports::router())
                .merge(admin::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Local frontend plus `FRONTEND_URL` when set.
pub fn allowed_origins(config: &AppConfig) -> Vec<HeaderValue> {
    std::iter::once(DEV_ORIGIN)
        .chain(config.frontend_url.as_deref())
        .map(|o| o.trim_end_matches('/'))
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(config)))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = call(build_app(AppState::fake()), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn me_requires_a_token() {
        let (status, body) = call(build_app(AppState::fake()), get("/api/v1/users/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_bearer_is_rejected() {
        let req = Request::builder()
            .uri("/api/v1/users/me")
            .header(header::AUTHORIZATION, "Basic abc")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(build_app(AppState::fake()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn zero_page_is_a_bad_request() {
        let (status, _) = call(build_app(AppState::fake()), get("/api/v1/listings?page=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_routes_need_a_token() {
        let (status, _) = call(build_app(AppState::fake()), get("/api/v1/admin/stats")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_path_params_get_the_error_envelope() {
        for uri in [
            "/api/v1/listings/not-a-uuid",
            "/api/v1/categories/abc",
            "/api/v1/listing-images/xyz",
        ] {
            let res = build_app(AppState::fake()).oneshot(get(uri)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(
                res.headers().get(header::CONTENT_TYPE).unwrap(),
                "application/json",
                "{uri}"
            );
            let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert!(json["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _) = call(build_app(AppState::fake()), get("/api/v1/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preflight_allows_frontend_origin() {
        let mut state = AppState::fake();
        Arc::make_mut(&mut state.config).frontend_url = Some("https://market.example/".into());
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/listings")
            .header(header::ORIGIN, "https://market.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let res = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://market.example"
        );
    }

    #[tokio::test]
    async fn origins_include_dev_and_frontend() {
        let mut state = AppState::fake();
        assert_eq!(allowed_origins(&state.config), vec![HeaderValue::from_static(DEV_ORIGIN)]);
        Arc::make_mut(&mut state.config).frontend_url = Some("https://market.example".into());
        assert_eq!(allowed_origins(&state.config).len(), 2);
    }
}
