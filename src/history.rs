// Run History Recorder: one JobRun row per sync attempt, written up front
// so an operator can see a run that is still in flight.

use std::sync::Arc;

use tracing::info;

use crate::model::{JobRun, JobStatus};
use crate::store::{CacheStore, StoreError};

pub const JOB_FULL_SYNC: &str = "static-data-full";
pub const JOB_BASIC_SYNC: &str = "static-data-basic";

pub struct RunHistory<S: CacheStore> {
    store: Arc<S>,
}

impl<S: CacheStore> RunHistory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record the start of a run. The row is persisted immediately with
    /// `Running` status and the assigned id is set on the returned run.
    pub async fn begin(&self, job_type: &str) -> Result<JobRun, StoreError> {
        let mut run = JobRun::started(job_type);
        run.id = self.store.insert_job_run(&run).await?;
        info!(job_type, run_id = run.id, "sync run started");
        Ok(run)
    }

    pub async fn complete(
        &self,
        run: &mut JobRun,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        run.finish(JobStatus::Completed, message);
        run.details = details;
        self.store.update_job_run(run).await?;
        info!(
            job_type = %run.job_type,
            run_id = run.id,
            duration_secs = run.duration_secs,
            "sync run completed"
        );
        Ok(())
    }

    pub async fn fail(&self, run: &mut JobRun, error: &str) -> Result<(), StoreError> {
        run.finish(JobStatus::Failed, error);
        self.store.update_job_run(run).await?;
        info!(
            job_type = %run.job_type,
            run_id = run.id,
            error,
            "sync run failed"
        );
        Ok(())
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<JobRun>, StoreError> {
        self.store.recent_job_runs(limit).await
    }
}
