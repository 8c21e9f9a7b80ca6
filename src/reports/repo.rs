use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::dto::StatusFilter;
use super::repo_types::{Report, ReportReason, ReportStatus, ReportTargetType, ReportView};
use crate::pagination::Pagination;

const REPORT_COLUMNS: &str =
    "id, reporter_id, target_type, target_id, reason, details, status, resolved_at, created_at, updated_at";

const VIEW_SELECT: &str = r#"
    SELECT r.id, r.reporter_id, r.target_type, r.target_id, r.reason, r.details,
           r.status, r.resolved_at, r.created_at, r.updated_at,
           rep.display_name AS reporter_display_name,
           rep.slug AS reporter_slug,
           CASE r.target_type WHEN 'product' THEN tl.title ELSE tu.display_name END AS target_name,
           CASE r.target_type WHEN 'product' THEN tl.slug ELSE tu.slug END AS target_slug
      FROM reports r
      JOIN users rep ON rep.id = r.reporter_id
      LEFT JOIN listings tl ON r.target_type = 'product' AND tl.id::text = r.target_id
      LEFT JOIN users tu ON r.target_type = 'user' AND tu.slug = r.target_id
"#;

pub async fn insert(
    db: &PgPool,
    reporter_id: &str,
    target_type: ReportTargetType,
    target_id: &str,
    reason: ReportReason,
    details: Option<&str>,
) -> sqlx::Result<Report> {
    sqlx::query_as::<_, Report>(&format!(
        r#"
        INSERT INTO reports (reporter_id, target_type, target_id, reason, details)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(reporter_id)
    .bind(target_type)
    .bind(target_id)
    .bind(reason)
    .bind(details)
    .fetch_one(db)
    .await
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: StatusFilter) {
    match filter {
        StatusFilter::Open => {
            qb.push(" WHERE r.status = 'open'");
        }
        StatusFilter::Closed => {
            qb.push(" WHERE r.status IN ('resolved', 'rejected')");
        }
        StatusFilter::All => {}
    }
}

pub async fn list_page(db: &PgPool, filter: StatusFilter, p: Pagination) -> sqlx::Result<(Vec<ReportView>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(VIEW_SELECT);
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
        .push_bind(p.limit())
        .push(" OFFSET ")
        .push_bind(p.offset());
    let rows = qb.build_query_as::<ReportView>().fetch_all(db).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT count(*) FROM reports r");
    push_filter(&mut count, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;
    Ok((rows, total))
}

pub async fn find_view(db: &PgPool, id: Uuid) -> sqlx::Result<Option<ReportView>> {
    sqlx::query_as::<_, ReportView>(&format!("{VIEW_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Closing stamps `resolved_at`; reopening clears it.
pub async fn set_status(db: &PgPool, id: Uuid, status: ReportStatus) -> sqlx::Result<Option<Report>> {
    sqlx::query_as::<_, Report>(&format!(
        r#"
        UPDATE reports
           SET status = $2,
               resolved_at = CASE WHEN $2 = 'open'::report_status THEN NULL ELSE now() END,
               updated_at = now()
         WHERE id = $1
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(db)
    .await
}
