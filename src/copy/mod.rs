//! Copy engine. Two modes selected by a `HashedEntry`'s already-known fingerprint: local
//! sources are copied verbatim and the fingerprint was already computed by the hash stage;
//! network sources are copied with `hash::hash_stream` so the single read pass produces
//! both the copy and the fingerprint -- a network source must never be read twice. Temp
//! write, verify, then mtime-preserving promote into the content-addressed
//! `source/<medium>/<camera-slug>/<fingerprint>.<ext>` layout; `NetworkAbort` fires once
//! consecutive failures on one source cross a configured threshold.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::CopyConfig;
use crate::constants::SOURCE_FOLDER;
use crate::error::{ReelVaultError, Result};
use crate::hash::{self, Fingerprint};
use crate::model::{CopiedEntry, HashedEntry};
use crate::storage_profile::StorageProfile;

/// Checked before and during each file copy so a cancelled session stops promptly instead
/// of draining the remaining queue. Cheap to clone, shared across worker threads.
#[derive(Clone, Default)]
pub struct CancellationToken(std::sync::Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Destination path for an archived file: `<archiveRoot>/source/<medium>/<camera-slug>/<fingerprint>.<ext>`.
pub fn destination_path(archive_root: &Path, medium: &str, camera_slug: &str, fingerprint: &Fingerprint, extension: &str) -> PathBuf {
    archive_root
        .join(SOURCE_FOLDER)
        .join(medium)
        .join(camera_slug)
        .join(format!("{fingerprint}.{extension}"))
}

/// Copies one already-hashed local entry to its destination. The fingerprint is already
/// known, so this mode trusts it and only re-validates size on completion; the validate
/// stage does the authoritative re-hash.
pub fn copy_local(
    entry: HashedEntry,
    destination: PathBuf,
    medium: crate::model::Medium,
    camera_id: Option<i64>,
    camera_slug: String,
    cfg: &CopyConfig,
    profile: &StorageProfile,
    cancel: &CancellationToken,
) -> CopiedEntry {
    if cancel.is_cancelled() {
        return fail(entry, destination, medium, camera_id, camera_slug, "cancelled".to_string());
    }

    match copy_to_temp_then_rename(&entry.scanned.original_path, &destination, cfg, profile) {
        Ok(()) => entry.into_copied(destination, medium, camera_id, camera_slug),
        Err(e) => fail(entry, destination, medium, camera_id, camera_slug, e.to_string()),
    }
}

/// Copies a network-resident entry, computing its fingerprint inline via `hash::hash_stream`
/// so the source is read exactly once. Returns the derived fingerprint bound onto a fresh
/// `HashedEntry`, alongside the `CopiedEntry`, since the caller's scan-time entry carried no
/// fingerprint yet for this mode.
pub fn copy_network_inline_hash(
    mut scanned: crate::model::ScannedEntry,
    destination: PathBuf,
    medium: crate::model::Medium,
    camera_id: Option<i64>,
    camera_slug: String,
    cfg: &CopyConfig,
    profile: &StorageProfile,
    cancel: &CancellationToken,
    consecutive_failures: &mut u32,
) -> Result<CopiedEntry> {
    if cancel.is_cancelled() {
        return Err(ReelVaultError::Cancelled);
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = temp_path_for(&destination, cfg);

    let result = (|| -> Result<Fingerprint> {
        let source = File::open(&scanned.original_path)?;
        let sink = File::create(&temp_path)?;
        let (fingerprint, _bytes) =
            hash::hash_stream(BufReader::new(source), BufWriter::new(sink), profile.buffer_bytes)?;
        if profile.inter_op_delay_ms > 0 {
            thread::sleep(Duration::from_millis(profile.inter_op_delay_ms));
        }
        fs::rename(&temp_path, &destination)?;
        preserve_mtime(&scanned.original_path, &destination);
        Ok(fingerprint)
    })();

    match result {
        Ok(fingerprint) => {
            *consecutive_failures = 0;
            scanned.fingerprint = Some(fingerprint);
            let hashed = crate::model::HashedEntry { scanned };
            Ok(hashed.into_copied(destination, medium, camera_id, camera_slug))
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            *consecutive_failures += 1;
            if *consecutive_failures >= cfg.abort_threshold {
                Err(ReelVaultError::NetworkAbort {
                    consecutive_failures: *consecutive_failures,
                })
            } else {
                // Below the abort threshold: surface as a retryable error. The caller
                // re-attempts this same scanned entry rather than fabricating a
                // `CopiedEntry` with no real fingerprint.
                Err(e)
            }
        }
    }
}

fn copy_to_temp_then_rename(source: &Path, destination: &Path, cfg: &CopyConfig, profile: &StorageProfile) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = temp_path_for(destination, cfg);

    let outcome = (|| -> Result<()> {
        let mut src = BufReader::new(File::open(source)?);
        let mut dst = BufWriter::new(File::create(&temp_path)?);
        std::io::copy(&mut src, &mut dst)?;
        drop(dst);

        let source_size = fs::metadata(source)?.len();
        let temp_size = fs::metadata(&temp_path)?.len();
        if source_size != temp_size {
            return Err(ReelVaultError::Other(format!(
                "copy size mismatch: source {source_size} bytes, copy {temp_size} bytes"
            )));
        }
        if profile.inter_op_delay_ms > 0 {
            thread::sleep(Duration::from_millis(profile.inter_op_delay_ms));
        }
        fs::rename(&temp_path, destination)?;
        preserve_mtime(source, destination);
        Ok(())
    })();

    if outcome.is_err() && cfg.auto_rollback {
        let _ = fs::remove_file(&temp_path);
    }
    outcome
}

fn temp_path_for(destination: &Path, cfg: &CopyConfig) -> PathBuf {
    let suffix = format!("{}{}", cfg.temp_suffix, rand::random::<u32>());
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(&suffix);
    destination.with_file_name(name)
}

fn preserve_mtime(source: &Path, destination: &Path) {
    if let Ok(meta) = fs::metadata(source) {
        if let Ok(modified) = meta.modified() {
            let _ = filetime::set_file_mtime(destination, filetime::FileTime::from_system_time(modified));
        }
    }
}

fn fail(
    entry: HashedEntry,
    destination: PathBuf,
    medium: crate::model::Medium,
    camera_id: Option<i64>,
    camera_slug: String,
    message: String,
) -> CopiedEntry {
    entry
        .into_copied(destination, medium, camera_id, camera_slug)
        .into_with_error(message)
}

/// Rolls back a partially-copied destination file (used when validate fails and
/// `CopyConfig::auto_rollback` is set).
pub fn rollback(destination: &Path) -> Result<()> {
    if destination.exists() {
        fs::remove_file(destination)?;
    }
    Ok(())
}

trait WithError {
    fn into_with_error(self, message: String) -> CopiedEntry;
}

impl WithError for CopiedEntry {
    fn into_with_error(mut self, message: String) -> CopiedEntry {
        self.copy_error = Some(message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryKind, Medium, ScannedEntry};
    use tempfile::tempdir;

    fn scanned(path: PathBuf, fingerprint: Fingerprint) -> HashedEntry {
        ScannedEntry {
            scan_id: 0,
            original_path: path,
            basename: "clip.mp4".into(),
            extension: "mp4".into(),
            size_bytes: 5,
            kind: EntryKind::Video,
            fingerprint: None,
            hash_error: None,
            is_duplicate: false,
            duplicate_source: None,
        }
        .with_fingerprint(fingerprint)
    }

    #[test]
    fn copies_local_file_and_preserves_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"hello").unwrap();
        let destination = dir.path().join("out").join("abc.mp4");

        let fp = hash::fingerprint_of_bytes(b"hello");
        let entry = scanned(source, fp);
        let cfg = CopyConfig::default();
        let profile = StorageProfile {
            kind: crate::storage_profile::Locality::Local,
            buffer_bytes: 65536,
            inter_op_delay_ms: 0,
            concurrency: 4,
            retry_delays_ms: Vec::new(),
        };
        let cancel = CancellationToken::new();

        let copied = copy_local(entry, destination.clone(), Medium::Modern, None, "sony-a7".into(), &cfg, &profile, &cancel);
        assert!(copied.copy_error.is_none());
        assert_eq!(fs::read(&destination).unwrap(), b"hello");
    }

    #[test]
    fn cancelled_token_short_circuits_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"hello").unwrap();
        let destination = dir.path().join("out.mp4");

        let fp = hash::fingerprint_of_bytes(b"hello");
        let entry = scanned(source, fp);
        let cfg = CopyConfig::default();
        let profile = StorageProfile {
            kind: crate::storage_profile::Locality::Local,
            buffer_bytes: 65536,
            inter_op_delay_ms: 0,
            concurrency: 4,
            retry_delays_ms: Vec::new(),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let copied = copy_local(entry, destination, Medium::Modern, None, "sony-a7".into(), &cfg, &profile, &cancel);
        assert!(copied.copy_error.is_some());
    }
}
