//! Concurrency-capped worker pool. Each slot is an OS thread pinned to one `CapClass` for
//! its whole lifetime -- the number of threads able to run a given kind is exactly that
//! class's configured cap, so there is no shared counter to keep consistent. One thread per
//! concurrency slot, each wrapping its dispatch in `catch_unwind`, since a bad job must
//! never take the whole pool down with it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::background_service::BackgroundService;
use crate::config::JobQueueConfig;
use crate::repository::{CapClass, FileRepository, JobRepository, ProjectRepository};

use super::progress::{self, EventSink, JobProgress};
use super::{dispatch, JobContext};

/// A running pool of pinned-class worker threads. Call `shutdown` to stop every slot after
/// its current job (if any) finishes.
pub struct WorkerPool {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        jobs: Arc<dyn JobRepository + Send + Sync>,
        files: Arc<dyn FileRepository + Send + Sync>,
        projects: Arc<dyn ProjectRepository + Send + Sync>,
        ml_service: Option<Arc<Mutex<BackgroundService>>>,
        cfg: JobQueueConfig,
        sink: EventSink,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();

        for (class, slot_count) in [
            (CapClass::Light, cfg.cap_light),
            (CapClass::Medium, cfg.cap_medium),
            (CapClass::Heavy, cfg.cap_heavy),
        ] {
            for _ in 0..slot_count {
                handles.push(spawn_slot(
                    class,
                    Arc::clone(&jobs),
                    Arc::clone(&files),
                    Arc::clone(&projects),
                    ml_service.clone(),
                    cfg.clone(),
                    sink.clone(),
                    Arc::clone(&stop),
                ));
            }
        }

        Self { stop, handles }
    }

    /// Signals every slot to stop after its current job and waits for them to exit.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_slot(
    class: CapClass,
    jobs: Arc<dyn JobRepository + Send + Sync>,
    files: Arc<dyn FileRepository + Send + Sync>,
    projects: Arc<dyn ProjectRepository + Send + Sync>,
    ml_service: Option<Arc<Mutex<BackgroundService>>>,
    cfg: JobQueueConfig,
    sink: EventSink,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("job-worker-{class:?}"))
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let _ = jobs.reclaim_expired();

                let candidate = jobs
                    .find_pending(32)
                    .unwrap_or_default()
                    .into_iter()
                    .find(|job| job.kind.cap_class() == class);

                let Some(candidate) = candidate else {
                    thread::sleep(Duration::from_millis(cfg.poll_interval_ms));
                    continue;
                };

                let claimed = match jobs.claim(candidate.id, cfg.lease_duration_seconds) {
                    Ok(Some(job)) => job,
                    Ok(None) => continue, // another slot already took it
                    Err(e) => {
                        log::error!("job worker: failed to claim job {}: {e}", candidate.id);
                        continue;
                    }
                };

                let ctx = JobContext {
                    files: files.as_ref(),
                    projects: projects.as_ref(),
                    ml_service: ml_service.as_deref(),
                };

                progress::emit(&sink, JobProgress::new(claimed.id.to_string(), claimed.kind.as_str(), 0, 1));

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(&claimed, &ctx)));

                match outcome {
                    Ok(Ok(elapsed_ms)) => {
                        let _ = jobs.complete(claimed.id, elapsed_ms);
                        progress::emit(&sink, JobProgress::new(claimed.id.to_string(), claimed.kind.as_str(), 1, 1));
                    }
                    Ok(Err(e)) => {
                        let message = e.to_string();
                        let _ = jobs.fail(claimed.id, &message, cfg.base_backoff_seconds);
                        progress::emit(
                            &sink,
                            JobProgress::new(claimed.id.to_string(), claimed.kind.as_str(), 0, 1).error(message),
                        );
                    }
                    Err(_) => {
                        log::error!("job worker: job {} panicked (recovered)", claimed.id);
                        let _ = jobs.fail(claimed.id, "job panicked", cfg.base_backoff_seconds);
                    }
                }
            }
        })
        .expect("failed to spawn job worker thread")
}
