//! Per-kind job execution. `runner` owns dispatch, concurrency, and retries; each function
//! here just does the one kind's work against an already-claimed job's file: resolve the
//! row, do the work, report success or a message.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::background_service::BackgroundService;
use crate::constants::{GALLERY_FOLDER, PROXIES_FOLDER, THUMBNAILS_FOLDER};
use crate::error::{ReelVaultError, Result};
use crate::hash;
use crate::preview::{gallery, proxy, thumb};
use crate::repository::{FileRecord, FileRepository, ProjectRecord};

/// `thumbnails/`, `gallery/` and `proxies/` sit directly under the project folder --
/// siblings of `source/` and `documents/`, not nested under the internal catalog folder
/// that holds the database and staging area.
fn output_path(project: &ProjectRecord, subfolder: &str, fingerprint: &str, extension: &str) -> PathBuf {
    Path::new(&project.working_root)
        .join(&project.folder_name)
        .join(subfolder)
        .join(format!("{fingerprint}.{extension}"))
}

/// Re-hashes the archived file and compares it against the fingerprint of record. This is
/// the only check that an archive copy hasn't rotted or been silently altered after ingest.
pub fn run_integrity(file: &FileRecord) -> Result<()> {
    let actual = hash::fingerprint_of_file(Path::new(&file.archive_path))?;
    if actual.as_str() != file.fingerprint {
        return Err(ReelVaultError::Hash(format!(
            "integrity check failed for file {}: expected {}, computed {actual}",
            file.id, file.fingerprint
        )));
    }
    Ok(())
}

pub fn run_thumbnail(file: &FileRecord, project: &ProjectRecord, files: &dyn FileRepository) -> Result<()> {
    let output = output_path(project, THUMBNAILS_FOLDER, &file.fingerprint, "jpg");
    let source = Path::new(&file.archive_path);
    let options = thumb::ThumbOptions::default();

    let generated = match file.kind.as_str() {
        "image" => thumb::generate_image_thumbnail(source, &output, &options),
        "audio" => thumb::generate_audio_thumbnail(source, &output, &options),
        _ => thumb::generate_thumbnail(source, &output, file.duration_ms, &options),
    };
    generated.map_err(|e| ReelVaultError::Other(format!("thumbnail generation failed: {e}")))?;

    if file.kind == "video" {
        let gallery_dir = Path::new(&project.working_root)
            .join(&project.folder_name)
            .join(GALLERY_FOLDER);
        if let Err(e) = gallery::generate_gallery(source, &gallery_dir, &file.fingerprint, file.duration_ms) {
            log::warn!("gallery generation failed for file {}: {e}", file.id);
        }
    }

    files.update_thumbnail_path(file.id, &output.to_string_lossy())
}

/// Proxies are only meaningful for video; other media kinds are a no-op success so the job
/// doesn't retry forever against a file that will never have one.
pub fn run_proxy(file: &FileRecord, project: &ProjectRecord, files: &dyn FileRepository) -> Result<()> {
    if file.kind != "video" {
        return Ok(());
    }

    let output = output_path(project, PROXIES_FOLDER, &file.fingerprint, "mp4");
    let source = Path::new(&file.archive_path);
    proxy::generate_proxy(source, &output, &proxy::ProxyOptions::default())
        .map_err(|e| ReelVaultError::Other(format!("proxy generation failed: {e}")))?;

    files.update_proxy_path(file.id, &output.to_string_lossy())
}

/// Marks the ML-extractor service active and hands the file off. The extraction itself is
/// an opaque external subprocess; a job with no service configured just logs and succeeds
/// rather than dead-lettering against a feature nobody enabled.
pub fn run_ml_extract(file: &FileRecord, service: Option<&Mutex<BackgroundService>>) -> Result<()> {
    match service {
        Some(service) => {
            service.lock().unwrap().mark_active();
            Ok(())
        }
        None => {
            log::debug!("no ML-extractor service configured; skipping extraction for file {}", file.id);
            Ok(())
        }
    }
}
