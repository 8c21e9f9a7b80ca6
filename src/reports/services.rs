use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::dto::NewReport;
use super::repo;
use super::repo_types::{Report, ReportTargetType};
use crate::error::{ApiError, ApiResult};
use crate::listings::{self, repo_types::ListingStatus};
use crate::users;

/// Files a report after checking that its target exists.
pub async fn create_report(db: &PgPool, reporter_id: &str, new: NewReport) -> ApiResult<Report> {
    match new.target_type {
        ReportTargetType::Product => {
            let id = Uuid::parse_str(&new.target_id)
                .map_err(|_| ApiError::validation("target_id must be a listing id"))?;
            listings::repo::find(db, id)
                .await?
                .filter(|l| l.status != ListingStatus::Deleted)
                .ok_or_else(|| ApiError::not_found("reported listing not found"))?;
        }
        ReportTargetType::User => {
            users::repo::find_visible_by_slug(db, &new.target_id)
                .await?
                .ok_or_else(|| ApiError::not_found("reported user not found"))?;
        }
    }

    let report = repo::insert(
        db,
        reporter_id,
        new.target_type,
        &new.target_id,
        new.reason,
        new.details.as_deref(),
    )
    .await?;
    info!(report_id = %report.id, target_type = ?report.target_type, "report filed");
    Ok(report)
}
