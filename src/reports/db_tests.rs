use sqlx::PgPool;

use super::dto::NewReport;
use super::repo_types::{ReportReason, ReportStatus, ReportTargetType};
use super::services::create_report;
use crate::error::ApiError;
use crate::testing;
use crate::users::{self, repo_types::Role};

fn user_report(slug: &str) -> NewReport {
    NewReport {
        target_type: ReportTargetType::User,
        target_id: slug.to_string(),
        reason: ReportReason::Fraud,
        details: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn users_pending_deletion_cannot_be_reported(db: PgPool) {
    let reporter = testing::user(&db, "rita", Role::User).await;
    let target = testing::user(&db, "tom", Role::User).await;

    let report = create_report(&db, &reporter.id, user_report(&target.slug)).await.unwrap();
    assert_eq!(report.status, ReportStatus::Open);

    users::repo::mark_deletion_requested(&db, &target.id).await.unwrap();
    let err = create_report(&db, &reporter.id, user_report(&target.slug))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
