use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub url: String,
    pub key: String,
    pub public_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateImageRequest {
    pub listing_id: Uuid,
    pub key: String,
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    pub display_order: i32,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub src: String,
    pub display_order: i32,
}
