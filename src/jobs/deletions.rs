use tracing::{error, info};

use crate::state::AppState;
use crate::users;

/// Finishes account deletions that were interrupted after the marker was
/// written. Returns the number of accounts purged.
pub async fn run(state: AppState) -> anyhow::Result<usize> {
    let pending = users::repo::list_pending_deletion(&state.db).await?;
    let mut purged = 0;
    for user_id in pending {
        match users::services::purge(&state, &user_id).await {
            Ok(()) => {
                info!(%user_id, "pending deletion completed");
                purged += 1;
            }
            Err(e) => error!(%user_id, error = ?e, "pending deletion failed; will retry"),
        }
    }
    Ok(purged)
}
