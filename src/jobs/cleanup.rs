use std::collections::HashSet;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::images;
use crate::state::AppState;
use crate::storage::StoredObject;

/// Uploads younger than this are left alone; the client may not have
/// attached them yet.
pub const GRACE: Duration = Duration::hours(24);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupPlan {
    pub delete_objects: Vec<String>,
    pub delete_rows: Vec<Uuid>,
}

/// Pairs image rows with bucket objects. Unreferenced objects past the grace
/// period are dropped, as are rows whose object is gone. Objects with no
/// modification time are kept.
pub fn reconcile(rows: &[(Uuid, String)], objects: &[StoredObject], now: OffsetDateTime) -> CleanupPlan {
    let referenced: HashSet<&str> = rows.iter().map(|(_, key)| key.as_str()).collect();
    let stored: HashSet<&str> = objects.iter().map(|o| o.key.as_str()).collect();

    let delete_objects = objects
        .iter()
        .filter(|o| !referenced.contains(o.key.as_str()))
        .filter(|o| matches!(o.last_modified, Some(t) if now - t > GRACE))
        .map(|o| o.key.clone())
        .collect();

    let delete_rows = rows
        .iter()
        .filter(|(_, key)| !stored.contains(key.as_str()))
        .map(|(id, _)| *id)
        .collect();

    CleanupPlan {
        delete_objects,
        delete_rows,
    }
}

/// Deletes orphaned objects and dangling image rows. Returns how many of each
/// were removed.
pub async fn run(state: AppState) -> anyhow::Result<usize> {
    if state.config.env.is_production() {
        info!("image cleanup skipped in production");
        return Ok(0);
    }

    let rows = images::repo::all_keys(&state.db).await?;
    let objects = state.storage.list_objects().await?;
    let plan = reconcile(&rows, &objects, OffsetDateTime::now_utc());

    let mut removed = 0;
    for key in &plan.delete_objects {
        match state.storage.delete_object(key).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(%key, error = ?e, "failed to delete orphaned object"),
        }
    }
    if !plan.delete_rows.is_empty() {
        removed += images::repo::delete_many(&state.db, &plan.delete_rows).await? as usize;
    }

    info!(
        objects = plan.delete_objects.len(),
        rows = plan.delete_rows.len(),
        "image cleanup finished"
    );
    Ok(removed)
}
