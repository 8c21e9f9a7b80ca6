//! Daily background jobs.

use std::sync::Arc;

use anyhow::Context;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error};

use crate::state::AppState;

pub mod cleanup;
pub mod deletions;

/// 03:00 UTC every day.
pub const IMAGE_CLEANUP_CRON: &str = "0 0 3 * * *";
/// 04:00 UTC every day.
pub const DELETION_SWEEP_CRON: &str = "0 0 4 * * *";

pub struct Scheduler {
    state: AppState,
    sched: JobScheduler,
}

impl Scheduler {
    pub async fn new(state: AppState) -> anyhow::Result<Self> {
        let sched = JobScheduler::new().await.context("create job scheduler")?;
        Ok(Self { state, sched })
    }

    /// Registers every job and starts the scheduler. Jobs keep running on
    /// the scheduler's own tasks.
    pub async fn start(mut self) -> anyhow::Result<JobScheduler> {
        self.schedule_job(IMAGE_CLEANUP_CRON, "image cleanup", cleanup::run)
            .await?;
        self.schedule_job(DELETION_SWEEP_CRON, "pending deletion sweep", deletions::run)
            .await?;

        self.sched.start().await.context("start job scheduler")?;
        Ok(self.sched)
    }

    pub async fn schedule_job<F, Fut>(&mut self, cron: &str, name: &str, function: F) -> anyhow::Result<()>
    where
        F: Fn(AppState) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<usize>> + Send + 'static,
    {
        let state = self.state.clone();
        let name = name.to_string();
        let function = Arc::new(function);

        let job = Job::new_async(cron, move |_, _| {
            let state = state.clone();
            let name = name.clone();
            let function = Arc::clone(&function);

            Box::pin(async move {
                match function(state).await {
                    Ok(count) => debug!(job = %name, count, "job finished"),
                    Err(e) => error!(job = %name, error = ?e, "job failed"),
                }
            })
        })
        .with_context(|| format!("build job for `{cron}`"))?;

        self.sched.add(job).await.context("register job")?;
        Ok(())
    }
}
