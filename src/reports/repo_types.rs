use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_target_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportTargetType {
    Product,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Fraud,
    Prohibited,
    FalseInformation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Resolved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: String,
    pub target_type: ReportTargetType,
    /// Listing id for products, user slug for users.
    pub target_id: String,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub status: ReportStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Report with reporter and target names for the moderation queue.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReportView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub report: Report,
    pub reporter_display_name: String,
    pub reporter_slug: String,
    pub target_name: Option<String>,
    pub target_slug: Option<String>,
}
