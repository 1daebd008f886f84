//! In-flight pipeline data model. These types live only for the duration of one
//! import session; the durable, repository-backed records are in `repository::model`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hash::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Video,
    Audio,
    Sidecar,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Modern,
    Dadcam,
    Super8,
}

impl Medium {
    pub fn as_str(&self) -> &'static str {
        match self {
            Medium::Modern => "modern",
            Medium::Dadcam => "dadcam",
            Medium::Super8 => "super8",
        }
    }
}

/// Produced by the scan stage, one per source file discovered.
#[derive(Debug, Clone)]
pub struct ScannedEntry {
    pub scan_id: u64,
    pub original_path: PathBuf,
    pub basename: String,
    pub extension: String,
    pub size_bytes: u64,
    pub kind: EntryKind,
    pub fingerprint: Option<Fingerprint>,
    pub hash_error: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_source: Option<String>,
}

impl ScannedEntry {
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> HashedEntry {
        self.fingerprint = Some(fingerprint);
        HashedEntry { scanned: self }
    }
}

/// Scanned entry with a fingerprint bound and duplicate status consulted against the
/// file index.
#[derive(Debug, Clone)]
pub struct HashedEntry {
    pub scanned: ScannedEntry,
}

impl HashedEntry {
    pub fn fingerprint(&self) -> &Fingerprint {
        self.scanned
            .fingerprint
            .as_ref()
            .expect("HashedEntry always carries a fingerprint")
    }

    pub fn into_copied(self, destination: PathBuf, medium: Medium, camera_id: Option<i64>, camera_slug: String) -> CopiedEntry {
        CopiedEntry {
            hashed: self,
            destination,
            copy_error: None,
            retry_count: 0,
            medium,
            camera_id,
            camera_slug,
        }
    }
}

/// Hashed entry plus the destination the copy engine wrote (or attempted to write) to.
#[derive(Debug, Clone)]
pub struct CopiedEntry {
    pub hashed: HashedEntry,
    pub destination: PathBuf,
    pub copy_error: Option<String>,
    pub retry_count: u32,
    pub medium: Medium,
    pub camera_id: Option<i64>,
    pub camera_slug: String,
}

impl CopiedEntry {
    pub fn fingerprint(&self) -> &Fingerprint {
        self.hashed.fingerprint()
    }

    pub fn into_validated(self, is_valid: bool, validation_error: Option<String>) -> ValidatedEntry {
        ValidatedEntry {
            copied: self,
            is_valid,
            validation_error,
        }
    }
}

/// Copied entry plus the validator's verdict.
#[derive(Debug, Clone)]
pub struct ValidatedEntry {
    pub copied: CopiedEntry,
    pub is_valid: bool,
    pub validation_error: Option<String>,
}

impl ValidatedEntry {
    pub fn fingerprint(&self) -> &Fingerprint {
        self.copied.fingerprint()
    }
}
