use std::str::FromStr;

use serde::Deserialize;

use super::repo_types::{ReportReason, ReportStatus, ReportTargetType};
use crate::error::ApiError;
use crate::patch::normalize_text;

const MAX_DETAILS_LEN: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub target_type: ReportTargetType,
    pub target_id: String,
    pub reason: ReportReason,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub target_type: ReportTargetType,
    pub target_id: String,
    pub reason: ReportReason,
    pub details: Option<String>,
}

impl CreateReportRequest {
    pub fn validate(self) -> Result<NewReport, ApiError> {
        let target_id = self.target_id.trim().to_string();
        if target_id.is_empty() {
            return Err(ApiError::validation("target_id is required"));
        }
        let details = normalize_text(self.details);
        if details.as_ref().is_some_and(|d| d.chars().count() > MAX_DETAILS_LEN) {
            return Err(ApiError::validation(format!(
                "details must be at most {MAX_DETAILS_LEN} characters"
            )));
        }
        Ok(NewReport {
            target_type: self.target_type,
            target_id,
            reason: self.reason,
            details,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateReportStatusRequest {
    pub status: ReportStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<String>,
}

/// Moderation queue filter: `open`, `closed` (resolved or rejected) or `all`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Open,
    Closed,
    #[default]
    All,
}

impl FromStr for StatusFilter {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(Self::All),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(ApiError::validation("status must be open, closed or all")),
        }
    }
}
