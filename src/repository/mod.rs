//! Repository trait layer.
//!
//! The core never talks SQL. It depends on these traits; `sqlite` below is the one
//! concrete adapter shipped with this crate. Splitting storage out this way keeps
//! business logic off `rusqlite` directly, so components become testable against an
//! in-memory fake without a real database.

pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::Result;
use crate::model::Medium;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Scanning,
    Hashing,
    Copying,
    Validating,
    Finalizing,
    Completed,
    Paused,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Scanning => "scanning",
            SessionStatus::Hashing => "hashing",
            SessionStatus::Copying => "copying",
            SessionStatus::Validating => "validating",
            SessionStatus::Finalizing => "finalizing",
            SessionStatus::Completed => "completed",
            SessionStatus::Paused => "paused",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_resumable_state(&self) -> bool {
        matches!(
            self,
            SessionStatus::Scanning
                | SessionStatus::Hashing
                | SessionStatus::Copying
                | SessionStatus::Validating
                | SessionStatus::Finalizing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Error,
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::Dead => "dead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Integrity,
    Thumbnail,
    Proxy,
    MlExtract,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Integrity => "integrity",
            JobKind::Thumbnail => "thumbnail",
            JobKind::Proxy => "proxy",
            JobKind::MlExtract => "ml_extract",
        }
    }

    /// Concurrency class this kind is pinned to in the worker pool.
    pub fn cap_class(&self) -> CapClass {
        match self {
            JobKind::Integrity | JobKind::Thumbnail => CapClass::Light,
            JobKind::Proxy => CapClass::Medium,
            JobKind::MlExtract => CapClass::Heavy,
        }
    }

    /// Recommended priority: integrity > thumbnails > proxy > ML extraction.
    pub fn default_priority(&self) -> i32 {
        match self {
            JobKind::Integrity => 10,
            JobKind::Thumbnail => 8,
            JobKind::Proxy => 5,
            JobKind::MlExtract => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapClass {
    Light,
    Medium,
    Heavy,
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub fingerprint: String,
    pub original_filename: String,
    pub original_path: String,
    pub archive_path: String,
    pub size_bytes: u64,
    pub extension: String,
    pub kind: String,
    pub medium: Medium,
    pub camera_id: Option<i64>,
    pub project_id: i64,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_ms: Option<i64>,
    pub frame_rate: Option<f64>,
    pub codec: Option<String>,
    pub bitrate: Option<i64>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub imported_at: DateTime<Utc>,
    pub thumbnail_path: Option<String>,
    pub proxy_path: Option<String>,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub fingerprint: String,
    pub original_filename: String,
    pub original_path: String,
    pub archive_path: String,
    pub size_bytes: u64,
    pub extension: String,
    pub kind: String,
    pub medium: Medium,
    pub camera_id: Option<i64>,
    pub project_id: i64,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_ms: Option<i64>,
    pub frame_rate: Option<f64>,
    pub codec: Option<String>,
    pub bitrate: Option<i64>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CameraPatternRecord {
    pub kind: String, // filename | folder | extension
    pub glob: String,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct CameraRecord {
    pub id: i64,
    pub display_name: String,
    pub nickname: Option<String>,
    pub medium: Medium,
    pub make: Option<String>,
    pub model: Option<String>,
    pub patterns: Vec<CameraPatternRecord>,
    pub lut_path: Option<String>,
    pub deinterlace: bool,
    pub audio_channel_policy: Option<String>,
    pub is_default: bool,
    pub active: bool,
    pub system: bool,
}

impl CameraRecord {
    pub fn slug(&self) -> String {
        slugify(self.nickname.as_deref().unwrap_or(&self.display_name))
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    pub folder_name: String,
    pub working_root: String,
    pub key_dates: Json,
}

#[derive(Debug, Clone)]
pub struct NewProjectRecord {
    pub name: String,
    pub folder_name: String,
    pub working_root: String,
    pub key_dates: Json,
}

#[derive(Debug, Clone)]
pub struct ImportSessionRecord {
    pub id: String,
    pub project_id: i64,
    pub status: SessionStatus,
    pub last_completed_stage: i32,
    pub resumable: bool,
    pub source_paths: Vec<String>,
    pub archive_path: String,
    pub total_files: i64,
    pub processed_files: i64,
    pub duplicate_files: i64,
    pub error_files: i64,
    pub total_bytes: i64,
    pub processed_bytes: i64,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub kind: JobKind,
    pub payload: Json,
    pub file_id: Option<i64>,
    pub project_id: Option<i64>,
    pub priority: i32,
    pub depends_on: Option<i64>,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_ms: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub payload: Json,
    pub file_id: Option<i64>,
    pub project_id: Option<i64>,
    pub priority: i32,
    pub depends_on: Option<i64>,
    pub max_retries: i32,
}

#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub id: i64,
    pub job_id: i64,
    pub kind: JobKind,
    pub payload: Json,
    pub error: String,
    pub acknowledged: bool,
}

pub trait FileRepository {
    fn find_by_hash(&self, fingerprint: &str) -> Result<Option<FileRecord>>;
    fn find_by_id(&self, file_id: i64) -> Result<Option<FileRecord>>;
    fn create(&self, record: &NewFileRecord) -> Result<FileRecord>;
    fn save_metadata(&self, file_id: i64, exif_blob: Option<&Json>, probe_blob: Option<&Json>) -> Result<()>;
    fn update_thumbnail_path(&self, file_id: i64, path: &str) -> Result<()>;
    fn update_proxy_path(&self, file_id: i64, path: &str) -> Result<()>;
    fn list_by_project(&self, project_id: i64) -> Result<Vec<FileRecord>>;
}

pub trait CameraRepository {
    fn find_all_with_patterns(&self) -> Result<Vec<CameraRecord>>;
    fn find_default_for_medium(&self, medium: Medium) -> Result<Option<CameraRecord>>;
}

pub trait ProjectRepository {
    fn find_by_id(&self, id: i64) -> Result<Option<ProjectRecord>>;
    fn create(&self, new: &NewProjectRecord) -> Result<ProjectRecord>;
    fn list_all(&self) -> Result<Vec<ProjectRecord>>;
}

pub trait SessionRepository {
    fn upsert(&self, row: &ImportSessionRecord) -> Result<()>;
    fn complete(&self, id: &str, status: SessionStatus) -> Result<()>;
    fn find_by_id(&self, id: &str) -> Result<Option<ImportSessionRecord>>;
    fn find_resumable(&self) -> Result<Vec<ImportSessionRecord>>;
    fn list_by_project(&self, project_id: i64) -> Result<Vec<ImportSessionRecord>>;
}

pub trait JobRepository {
    fn create(&self, job: &NewJob) -> Result<JobRecord>;
    fn find_pending(&self, limit: usize) -> Result<Vec<JobRecord>>;
    fn claim(&self, id: i64, lease_seconds: i64) -> Result<Option<JobRecord>>;
    fn complete(&self, id: i64, processing_ms: i64) -> Result<()>;
    fn fail(&self, id: i64, message: &str, base_backoff_seconds: i64) -> Result<()>;
    fn dead_letter(&self, id: i64, error: &str) -> Result<()>;
    fn acknowledge(&self, ids: &[i64]) -> Result<()>;
    fn reclaim_expired(&self) -> Result<usize>;
    /// Lists jobs, optionally restricted to one status, newest-created first.
    fn list(&self, status: Option<JobStatus>) -> Result<Vec<JobRecord>>;
    /// Re-enqueues one dead letter (or, if `id` is `None`, every unacknowledged dead letter)
    /// as a fresh pending job carrying the same kind and payload. Returns the count retried.
    fn retry_dead_letter(&self, id: Option<i64>) -> Result<usize>;
}
