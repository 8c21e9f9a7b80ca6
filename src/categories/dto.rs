use serde::{Deserialize, Serialize};

use super::repo::Category;
use crate::error::ApiError;
use crate::patch::double_option;

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i32>>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub parent_id: Option<Option<i32>>,
}

fn clean_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

impl CreateCategoryRequest {
    pub fn validate(self) -> Result<(String, Option<i32>), ApiError> {
        Ok((clean_name(&self.name)?, self.parent_id))
    }
}

impl UpdateCategoryRequest {
    pub fn validate(self) -> Result<CategoryPatch, ApiError> {
        let name = self.name.as_deref().map(clean_name).transpose()?;
        Ok(CategoryPatch {
            name,
            parent_id: self.parent_id,
        })
    }
}

/// Category with its subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub children: Vec<CategoryNode>,
}

impl From<&Category> for CategoryNode {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            parent_id: c.parent_id,
            children: Vec::new(),
        }
    }
}
