use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{ImageResponse, PresignResponse};
use super::repo::{self, ListingImage};
use crate::auth::policy::ensure_owner;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::users::repo_types::User;

pub const MAX_IMAGES_PER_LISTING: i64 = 10;
pub const KEY_PREFIX: &str = "listings/";

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Key shape handed out by [`presign_upload`]: `listings/<uuid>.<ext>`.
pub fn is_upload_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix(KEY_PREFIX) else {
        return false;
    };
    match rest.split_once('.') {
        Some((id, ext)) => Uuid::parse_str(id).is_ok() && matches!(ext, "jpg" | "png" | "webp"),
        None => false,
    }
}

pub fn to_response(st: &AppState, img: ListingImage) -> ImageResponse {
    ImageResponse {
        id: img.id,
        listing_id: img.listing_id,
        src: st.storage.public_url(&img.storage_key),
        display_order: img.display_order,
    }
}

pub async fn presign_upload(st: &AppState, content_type: &str) -> ApiResult<PresignResponse> {
    let content_type = content_type.trim().to_ascii_lowercase();
    let ext = ext_from_mime(&content_type)
        .ok_or_else(|| ApiError::validation("content_type must be image/png, image/jpeg or image/webp"))?;
    let key = format!("{KEY_PREFIX}{}.{}", Uuid::new_v4(), ext);
    let ttl = Duration::from_secs(st.config.storage.upload_ttl_secs);
    let url = st
        .storage
        .presign_upload(&key, &content_type, ttl)
        .await
        .with_context(|| format!("presign upload for {key}"))?;
    Ok(PresignResponse {
        public_url: st.storage.public_url(&key),
        url,
        key,
    })
}

/// Links an uploaded object to a listing owned by `caller`.
pub async fn attach(
    st: &AppState,
    caller: &User,
    listing_id: Uuid,
    key: &str,
    display_order: Option<i32>,
) -> ApiResult<ListingImage> {
    if !is_upload_key(key) {
        return Err(ApiError::validation("key was not issued by the upload endpoint"));
    }
    if matches!(display_order, Some(n) if n < 0) {
        return Err(ApiError::validation("display_order must be >= 0"));
    }

    let mut tx = st.db.begin().await?;
    let (owner, count) = repo::lock_listing_tx(&mut tx, listing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("listing not found"))?;
    ensure_owner(&owner, caller)?;
    if count >= MAX_IMAGES_PER_LISTING {
        return Err(ApiError::conflict(format!(
            "a listing can have at most {MAX_IMAGES_PER_LISTING} images"
        )));
    }
    let image = repo::insert_image_tx(&mut tx, listing_id, key, display_order).await?;
    tx.commit().await?;

    info!(image_id = %image.id, %listing_id, "image attached");
    Ok(image)
}

pub async fn reorder(st: &AppState, caller: &User, id: Uuid, display_order: i32) -> ApiResult<ListingImage> {
    if display_order < 0 {
        return Err(ApiError::validation("display_order must be >= 0"));
    }
    let owned = repo::find_owned(&st.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("image not found"))?;
    ensure_owner(&owned.owner_id, caller)?;
    Ok(repo::update_order(&st.db, id, display_order).await?)
}

/// Removes the row, then the object. A failed object delete is left to the
/// orphan reconciliation job.
pub async fn remove(st: &AppState, caller: &User, id: Uuid) -> ApiResult<()> {
    let owned = repo::find_owned(&st.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("image not found"))?;
    ensure_owner(&owned.owner_id, caller)?;
    if !repo::delete(&st.db, id).await? {
        return Err(ApiError::not_found("image not found"));
    }
    if let Err(e) = st.storage.delete_object(&owned.image.storage_key).await {
        warn!(error = %e, key = %owned.image.storage_key, "object delete failed; leaving it for cleanup");
    }
    Ok(())
}

#[cfg(test)]
mod image_tests {
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(super::ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(super::ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(super::ext_from_mime("image/png"), Some("png"));
        assert_eq!(super::ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(super::ext_from_mime("image/heic"), None);
        assert_eq!(super::ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_is_upload_key() {
        assert!(super::is_upload_key("listings/7f1c0a4e-4f3e-4c43-9d9e-0b8f3b2a1c11.png"));
        assert!(!super::is_upload_key("listings/../secrets.png"));
        assert!(!super::is_upload_key("avatars/7f1c0a4e-4f3e-4c43-9d9e-0b8f3b2a1c11.png"));
        assert!(!super::is_upload_key("listings/7f1c0a4e-4f3e-4c43-9d9e-0b8f3b2a1c11.gif"));
    }

    #[tokio::test]
    async fn test_presign_upload() {
        let state = AppState::fake();

        let res = super::presign_upload(&state, "Image/PNG").await.unwrap();
        assert!(res.key.starts_with("listings/"));
        assert!(res.key.ends_with(".png"));
        assert!(res.url.contains(&res.key));
        assert!(res.url.contains("ttl=900"));
        assert_eq!(res.public_url, format!("https://fake.local/{}", res.key));

        let err = super::presign_upload(&state, "image/gif").await.unwrap_err();
        assert!(matches!(err, crate::error::ApiError::Validation(_)));
    }
}
