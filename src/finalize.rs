//! Finalize stage. The last pipeline step for one validated entry: dedup check against the
//! file index, timestamp-precedence resolution, file-record insert, metadata persistence,
//! sidecar write, and downstream job enqueue -- all treated as one unit of work per file so
//! a crash mid-finalize never leaves a half-registered file.

use std::path::Path;

use serde_json::json;

use crate::camera::CameraMatch;
use crate::config::{JobQueueConfig, SidecarConfig};
use crate::error::Result;
use crate::metadata::{self, MediaInfo};
use crate::model::ValidatedEntry;
use crate::repository::{FileRepository, JobKind, JobRepository, NewFileRecord, NewJob, ProjectRecord};
use crate::sidecar;

pub struct FinalizeOutcome {
    pub file_id: i64,
    pub was_duplicate: bool,
}

pub fn finalize(
    entry: &ValidatedEntry,
    metadata_info: &MediaInfo,
    camera_match: &CameraMatch,
    project: &ProjectRecord,
    raw_exif: Option<&str>,
    raw_probe: Option<&str>,
    files: &dyn FileRepository,
    jobs: &dyn JobRepository,
    job_cfg: &JobQueueConfig,
    sidecar_cfg: &SidecarConfig,
    project_root: &Path,
) -> Result<FinalizeOutcome> {
    let fingerprint = entry.fingerprint().as_str().to_string();

    if let Some(existing) = files.find_by_hash(&fingerprint)? {
        return Ok(FinalizeOutcome { file_id: existing.id, was_duplicate: true });
    }

    let (recorded_at, _timestamp_source) = resolve_timestamp(&entry.copied.hashed.scanned.original_path, metadata_info);

    let record = NewFileRecord {
        fingerprint: fingerprint.clone(),
        original_filename: entry.copied.hashed.scanned.basename.clone(),
        original_path: entry.copied.hashed.scanned.original_path.to_string_lossy().to_string(),
        archive_path: entry.copied.destination.to_string_lossy().to_string(),
        size_bytes: entry.copied.hashed.scanned.size_bytes,
        extension: entry.copied.hashed.scanned.extension.clone(),
        kind: metadata::detect_media_type(&entry.copied.hashed.scanned.extension).to_string(),
        medium: entry.copied.medium,
        camera_id: entry.copied.camera_id,
        project_id: project.id,
        camera_make: metadata_info.make.clone(),
        camera_model: metadata_info.model.clone(),
        lens: metadata_info.lens.clone(),
        width: metadata_info.width,
        height: metadata_info.height,
        duration_ms: metadata_info.duration_ms,
        frame_rate: metadata_info.frame_rate,
        codec: metadata_info.codec.clone(),
        bitrate: metadata_info.bitrate,
        recorded_at,
    };

    let created = files.create(&record)?;
    let exif_blob = raw_exif.and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok());
    let probe_blob = raw_probe.and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok());
    files.save_metadata(created.id, exif_blob.as_ref(), probe_blob.as_ref())?;

    if let Err(e) = sidecar::write_file_sidecar(project_root, &created, camera_match, project, exif_blob, probe_blob, sidecar_cfg) {
        log::warn!("sidecar write failed for file {}: {e}", created.id);
    }

    enqueue_derivation_jobs(created.id, project.id, jobs, job_cfg)?;

    Ok(FinalizeOutcome { file_id: created.id, was_duplicate: false })
}

/// Integrity runs first; thumbnail, proxy and ML-extraction all depend on it so none of
/// them runs against a file that failed its own re-hash.
fn enqueue_derivation_jobs(file_id: i64, project_id: i64, jobs: &dyn JobRepository, cfg: &JobQueueConfig) -> Result<()> {
    let integrity = jobs.create(&NewJob {
        kind: JobKind::Integrity,
        payload: json!({ "file_id": file_id }),
        file_id: Some(file_id),
        project_id: Some(project_id),
        priority: JobKind::Integrity.default_priority(),
        depends_on: None,
        max_retries: cfg.default_max_retries,
    })?;

    for kind in [JobKind::Thumbnail, JobKind::Proxy, JobKind::MlExtract] {
        jobs.create(&NewJob {
            kind,
            payload: json!({ "file_id": file_id }),
            file_id: Some(file_id),
            project_id: Some(project_id),
            priority: kind.default_priority(),
            depends_on: Some(integrity.id),
            max_retries: cfg.default_max_retries,
        })?;
    }
    Ok(())
}

/// Timestamp precedence: embedded metadata, then folder-name date, then filesystem mtime
/// (`constants::TIMESTAMP_PRECEDENCE`).
fn resolve_timestamp(path: &Path, metadata_info: &MediaInfo) -> (Option<chrono::DateTime<chrono::Utc>>, &'static str) {
    if let Some(raw) = &metadata_info.recorded_at {
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
            return (Some(dt.with_timezone(&chrono::Utc)), "metadata");
        }
    }

    if let Some(folder_name) = path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
        if let Some(date) = metadata::parse_folder_date(folder_name) {
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&date) {
                return (Some(dt.with_timezone(&chrono::Utc)), "folder");
            }
        }
    }

    if let Ok(meta) = std::fs::metadata(path) {
        if let Ok(modified) = meta.modified() {
            return (Some(modified.into()), "filesystem");
        }
    }

    (None, "unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::MatchRank;
    use crate::model::{EntryKind, Medium, ScannedEntry};
    use crate::repository::sqlite::{self, SqliteRepository};
    use crate::repository::ProjectRepository;
    use tempfile::tempdir;

    fn sample_entry(destination: std::path::PathBuf) -> ValidatedEntry {
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
        scanned
            .with_fingerprint(fingerprint)
            .into_copied(destination, Medium::Modern, None, "sony-a7".into())
            .into_validated(true, None)
    }

    #[test]
    fn finalize_inserts_file_record_and_enqueues_jobs() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("clip.mp4");
        std::fs::write(&destination, b"hello world").unwrap();

        let conn = sqlite::open_in_memory().unwrap();
        sqlite::seed_default_project(&conn).unwrap();
        let repo = SqliteRepository::new(conn);
        let project = ProjectRepository::find_by_id(&repo, 1).unwrap().expect("seeded default project");

        let entry = sample_entry(destination);
        let metadata_info = MediaInfo::default();
        let camera_match = CameraMatch {
            camera_id: None,
            camera_name: "Unidentified".into(),
            medium: Medium::Modern,
            rank: MatchRank::DefaultForMedium,
            confidence: 0.1,
        };

        let outcome = finalize(
            &entry,
            &metadata_info,
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

        assert!(!outcome.was_duplicate);
        assert!(repo.find_by_hash(entry.fingerprint().as_str()).unwrap().is_some());
    }
}
