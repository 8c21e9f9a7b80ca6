//! `Json`, `Path` and `Query` whose rejections are [`ApiError`]s, so malformed
//! input gets the usual `{error}` body and a 400.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        routing::post,
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    use crate::listings::repo_types::ListingCondition;

    #[derive(Debug, Serialize, Deserialize)]
    struct Item {
        title: String,
        condition: ListingCondition,
    }

    async fn echo(Path(id): Path<uuid::Uuid>, Json(item): Json<Item>) -> Json<(uuid::Uuid, Item)> {
        Json((id, item))
    }

    async fn send(uri: &str, body: &'static str) -> (StatusCode, Option<String>, serde_json::Value) {
        let app = Router::new().route("/items/:id", post(echo));
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, content_type, serde_json::from_slice(&bytes).unwrap())
    }

    const ID: &str = "/items/7f1c0a4e-4f3e-4c43-9d9e-0b8f3b2a1c11";

    #[tokio::test]
    async fn valid_input_passes_through() {
        let (status, _, json) = send(ID, r#"{"title":"Lamp","condition":"used"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[1]["condition"], "used");
    }

    #[tokio::test]
    async fn unknown_enum_value_is_a_bad_request() {
        let (status, content_type, json) = send(ID, r#"{"title":"Lamp","condition":"mint"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn missing_field_and_syntax_errors_are_bad_requests() {
        let (status, _, json) = send(ID, r#"{"title":"Lamp"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, _, _) = send(ID, "{nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_path_uses_error_body() {
        let (status, content_type, json) = send("/items/not-a-uuid", r#"{"title":"Lamp","condition":"used"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert!(json["error"].as_str().unwrap().contains("UUID"));
    }
}
