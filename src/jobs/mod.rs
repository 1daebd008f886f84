//! Job system: a durable, polled queue with per-kind concurrency caps, exponential-backoff
//! retry, and dead-lettering after `max_retries`. `repository::JobRepository` owns the atomic
//! claim/complete/fail SQL (see `repository::sqlite`); this module owns dispatch and the
//! worker pool that drives it.
//!
//! There is exactly one cancellation primitive in this crate, `copy::CancellationToken`,
//! shared by whichever import session is running; jobs have nothing equivalent to cancel
//! mid-flight since each kind here (integrity/thumbnail/proxy/ml-extract) runs to completion
//! or failure in one claim.

pub mod handlers;
pub mod progress;
pub mod runner;
pub mod worker;

use std::sync::Mutex;
use std::time::Instant;

use crate::background_service::BackgroundService;
use crate::error::{ReelVaultError, Result};
use crate::repository::{FileRepository, JobKind, JobRecord, ProjectRecord, ProjectRepository};

/// Everything a claimed job needs to execute, borrowed for the duration of one dispatch.
pub struct JobContext<'a> {
    pub files: &'a dyn FileRepository,
    pub projects: &'a dyn ProjectRepository,
    pub ml_service: Option<&'a Mutex<BackgroundService>>,
}

/// Runs one claimed job to completion, returning elapsed milliseconds on success.
pub fn dispatch(job: &JobRecord, ctx: &JobContext) -> Result<i64> {
    let started = Instant::now();

    let file_id = job
        .file_id
        .ok_or_else(|| ReelVaultError::Other(format!("job {} has no associated file", job.id)))?;
    let file = ctx
        .files
        .find_by_id(file_id)?
        .ok_or_else(|| ReelVaultError::FileNotFound(file_id.to_string()))?;

    match job.kind {
        JobKind::Integrity => handlers::run_integrity(&file)?,
        JobKind::Thumbnail => {
            let project = resolve_project(job, ctx)?;
            handlers::run_thumbnail(&file, &project, ctx.files)?;
        }
        JobKind::Proxy => {
            let project = resolve_project(job, ctx)?;
            handlers::run_proxy(&file, &project, ctx.files)?;
        }
        JobKind::MlExtract => handlers::run_ml_extract(&file, ctx.ml_service)?,
    }

    Ok(started.elapsed().as_millis() as i64)
}

fn resolve_project(job: &JobRecord, ctx: &JobContext) -> Result<ProjectRecord> {
    let project_id = job
        .project_id
        .ok_or_else(|| ReelVaultError::Other(format!("job {} has no associated project", job.id)))?;
    ctx.projects
        .find_by_id(project_id)?
        .ok_or_else(|| ReelVaultError::ProjectNotFound(project_id.to_string()))
}
