//! Single-threaded convenience runner: drains every pending, dependency-satisfied job,
//! ignoring concurrency caps since only one thread is doing the work. Used by the CLI's
//! one-shot `jobs run` command and by tests; a long-lived process uses `worker::WorkerPool`
//! instead. Dispatch goes through `super::dispatch` by `JobKind`.

use std::sync::Mutex;

use crate::background_service::BackgroundService;
use crate::error::Result;
use crate::repository::{FileRepository, JobRepository, ProjectRepository};

use super::{dispatch, JobContext};

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub completed: u64,
    pub failed: u64,
}

pub fn run_until_drained(
    jobs: &dyn JobRepository,
    files: &dyn FileRepository,
    projects: &dyn ProjectRepository,
    ml_service: Option<&Mutex<BackgroundService>>,
    base_backoff_seconds: i64,
    lease_duration_seconds: i64,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    jobs.reclaim_expired()?;

    loop {
        let Some(candidate) = jobs.find_pending(1)?.into_iter().next() else {
            break;
        };

        let Some(claimed) = jobs.claim(candidate.id, lease_duration_seconds)? else {
            // Another worker won the race for this row; the next poll will pick up
            // whatever it leaves behind.
            break;
        };

        let ctx = JobContext { files, projects, ml_service };

        match dispatch(&claimed, &ctx) {
            Ok(elapsed_ms) => {
                jobs.complete(claimed.id, elapsed_ms)?;
                summary.completed += 1;
            }
            Err(e) => {
                jobs.fail(claimed.id, &e.to_string(), base_backoff_seconds)?;
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraMatch, MatchRank};
    use crate::config::{JobQueueConfig, SidecarConfig};
    use crate::finalize;
    use crate::metadata::MediaInfo;
    use crate::model::{EntryKind, Medium, ScannedEntry};
    use crate::repository::sqlite::{self, SqliteRepository};
    use crate::repository::ProjectRepository;
    use tempfile::tempdir;

    #[test]
    fn drains_integrity_job_successfully_for_an_intact_file() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("clip.mp4");
        std::fs::write(&destination, b"hello world").unwrap();

        let conn = sqlite::open_in_memory().unwrap();
        sqlite::seed_default_project(&conn).unwrap();
        let repo = SqliteRepository::new(conn);

        let scanned = ScannedEntry {
            scan_id: 0,
            original_path: destination.clone(),
            basename: "clip.mp4".into(),
            extension: "mp4".into(),
            size_bytes: 11,
            kind: EntryKind::Video,
            fingerprint: None,
            hash_error: None,
            is_duplicate: false,
            duplicate_source: None,
        };
        let fingerprint = crate::hash::fingerprint_of_bytes(b"hello world");
        let entry = scanned
            .with_fingerprint(fingerprint)
            .into_copied(destination, Medium::Modern, None, "sony-a7".into())
            .into_validated(true, None);

        let camera_match = CameraMatch {
            camera_id: None,
            camera_name: "Unidentified".into(),
            medium: Medium::Modern,
            rank: MatchRank::DefaultForMedium,
            confidence: 0.1,
        };

        let project = ProjectRepository::find_by_id(&repo, 1).unwrap().expect("seeded default project");
        finalize::finalize(
            &entry,
            &MediaInfo::default(),
            &camera_match,
            &project,
            None,
            None,
            &repo,
            &repo,
            &JobQueueConfig::default(),
            &SidecarConfig::default(),
            dir.path(),
        )
        .unwrap();

        // Thumbnail/proxy jobs fail without a real ffmpeg binary on PATH; only assert that
        // the drain makes progress and the integrity job (no external tool needed) completes.
        let summary = run_until_drained(&repo, &repo, &repo, None, 60, 300).unwrap();
        assert!(summary.completed >= 1);
    }
}
