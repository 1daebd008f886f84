//! Validate stage. Re-hashes the copied file at its destination and compares against the
//! fingerprint computed (or trusted) earlier in the pipeline. A mismatch rolls the
//! destination back when the copy engine's `auto_rollback` is enabled, so a corrupted copy
//! never lingers as if it were good. One re-hash per entry, not a whole-session rescan.

use crate::config::CopyConfig;
use crate::copy;
use crate::error::Result;
use crate::hash;
use crate::model::{CopiedEntry, ValidatedEntry};

pub fn validate(entry: CopiedEntry, cfg: &CopyConfig) -> Result<ValidatedEntry> {
    if entry.copy_error.is_some() {
        let error = entry.copy_error.clone();
        return Ok(entry.into_validated(false, error));
    }

    let expected = entry.fingerprint().clone();
    let actual = hash::fingerprint_of_file(&entry.destination)?;

    if actual == expected {
        Ok(entry.into_validated(true, None))
    } else {
        let message = format!(
            "validation hash mismatch: expected {expected}, got {actual} at {}",
            entry.destination.display()
        );
        if cfg.auto_rollback {
            copy::rollback(&entry.destination)?;
        }
        Ok(entry.into_validated(false, Some(message)))
    }
}

/// A destination that already exists with the expected fingerprint is treated as already
/// validated without re-copying, so resuming an interrupted session never redoes finished
/// work.
pub fn already_present_and_valid(entry: &CopiedEntry) -> Result<bool> {
    if !entry.destination.exists() {
        return Ok(false);
    }
    let actual = hash::fingerprint_of_file(&entry.destination)?;
    Ok(&actual == entry.fingerprint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryKind, Medium, ScannedEntry};
    use std::fs;
    use tempfile::tempdir;

    fn copied_entry(destination: std::path::PathBuf, contents: &[u8]) -> CopiedEntry {
        fs::write(&destination, contents).unwrap();
        let fingerprint = hash::fingerprint_of_bytes(contents);
        let scanned = ScannedEntry {
            scan_id: 0,
            original_path: destination.clone(),
            basename: "clip.mp4".into(),
            extension: "mp4".into(),
            size_bytes: contents.len() as u64,
            kind: EntryKind::Video,
            fingerprint: None,
            hash_error: None,
            is_duplicate: false,
            duplicate_source: None,
        };
        scanned
            .with_fingerprint(fingerprint)
            .into_copied(destination, Medium::Modern, None, "sony-a7".into())
    }

    #[test]
    fn matching_hash_validates_clean() {
        let dir = tempdir().unwrap();
        let entry = copied_entry(dir.path().join("clip.mp4"), b"hello world");
        let cfg = CopyConfig::default();
        let validated = validate(entry, &cfg).unwrap();
        assert!(validated.is_valid);
        assert!(validated.validation_error.is_none());
    }

    #[test]
    fn corrupted_destination_fails_and_rolls_back() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("clip.mp4");
        let mut entry = copied_entry(destination.clone(), b"hello world");
        fs::write(&destination, b"corrupted!!").unwrap();
        entry.destination = destination.clone();

        let cfg = CopyConfig::default();
        let validated = validate(entry, &cfg).unwrap();
        assert!(!validated.is_valid);
        assert!(!destination.exists());
    }
}
