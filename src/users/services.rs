use anyhow::Context;
use tracing::{info, warn};

use super::repo;
use crate::auth::identity::IdentityError;
use crate::error::ApiResult;
use crate::state::AppState;

/// Marks the account for deletion and purges it. When the purge fails the
/// marker stays, the user is locked out, and the daily sweep retries.
pub async fn delete_account(state: &AppState, user_id: &str) -> ApiResult<()> {
    repo::mark_deletion_requested(&state.db, user_id).await?;
    purge(state, user_id).await?;
    info!(%user_id, "account deleted");
    Ok(())
}

/// Deletes the identity account, then every local row owned by the user.
/// An identity account that is already gone counts as deleted.
pub async fn purge(state: &AppState, user_id: &str) -> anyhow::Result<()> {
    match state.identity.delete(user_id).await {
        Ok(()) => {}
        Err(IdentityError::NotFound) => warn!(%user_id, "identity account already gone"),
        Err(e) => return Err(anyhow::Error::new(e).context("delete identity account")),
    }
    repo::delete_cascade(&state.db, user_id)
        .await
        .context("delete local user data")?;
    Ok(())
}
