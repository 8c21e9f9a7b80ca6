use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::User;
use crate::error::ApiError;
use crate::patch::{double_option, normalize_text};

const MAX_CONTACT_LEN: usize = 64;
const MAX_URL_LEN: usize = 2048;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMeRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub photo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub whatsapp: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub telegram: Option<Option<String>>,
    pub verified: Option<bool>,
}

/// Validated profile changes. `Some(None)` clears a column.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub photo_url: Option<Option<String>>,
    pub whatsapp: Option<Option<String>>,
    pub telegram: Option<Option<String>>,
    pub verified: Option<bool>,
}

impl UpdateMeRequest {
    pub fn validate(self) -> Result<UserPatch, ApiError> {
        let photo_url = self.photo_url.map(normalize_text);
        if let Some(Some(url)) = &photo_url {
            if url.len() > MAX_URL_LEN || !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ApiError::validation("photo_url must be an http(s) URL"));
            }
        }
        let whatsapp = contact("whatsapp", self.whatsapp)?;
        let telegram = contact("telegram", self.telegram)?;
        Ok(UserPatch {
            photo_url,
            whatsapp,
            telegram,
            verified: self.verified,
        })
    }
}

fn contact(field: &str, v: Option<Option<String>>) -> Result<Option<Option<String>>, ApiError> {
    let v = v.map(normalize_text);
    if let Some(Some(s)) = &v {
        if s.chars().count() > MAX_CONTACT_LEN {
            return Err(ApiError::validation(format!(
                "{field} must be at most {MAX_CONTACT_LEN} characters"
            )));
        }
    }
    Ok(v)
}

/// Profile as shown to other users.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub display_name: String,
    pub slug: String,
    pub photo_url: Option<String>,
    pub university: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram: Option<String>,
    pub verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicProfile {
    fn from(u: User) -> Self {
        Self {
            display_name: u.display_name,
            slug: u.slug,
            photo_url: u.photo_url,
            university: u.university,
            whatsapp: u.whatsapp,
            telegram: u.telegram,
            verified: u.verified,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IsOwnerResponse {
    pub is_owner: bool,
}
