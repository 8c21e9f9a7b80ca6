use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateReportRequest, ReportListQuery, StatusFilter, UpdateReportStatusRequest};
use super::repo;
use super::repo_types::{Report, ReportView};
use super::services;
use crate::auth::extractors::{AdminUser, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::{Page, Pagination};
use crate::state::AppState;

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports", get(list_reports).post(create_report))
        .route("/reports/:id", get(get_report))
        .route("/reports/:id/status", put(update_report_status))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let new = payload.validate()?;
    let report = services::create_report(&state.db, &user.id, new).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_reports(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    p: Pagination,
    Query(q): Query<ReportListQuery>,
) -> ApiResult<Json<Page<ReportView>>> {
    let filter = q.status.as_deref().unwrap_or_default().parse::<StatusFilter>()?;
    let (rows, total) = repo::list_page(&state.db, filter, p).await?;
    Ok(Json(Page::new(rows, p, total)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn get_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReportView>> {
    repo::find_view(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("report not found"))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn update_report_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportStatusRequest>,
) -> ApiResult<Json<Report>> {
    let report = repo::set_status(&state.db, id, payload.status)
        .await?
        .ok_or_else(|| ApiError::not_found("report not found"))?;
    info!(report_id = %id, status = ?report.status, "report status updated");
    Ok(Json(report))
}
