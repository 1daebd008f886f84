//! Per-file sidecar writer. Writes `<archive-path-without-extension>.json` next to every
//! archived file, rewritten (not patched) whenever any of its input rows change. The
//! sidecar holds owned camera/project snapshots rather than foreign-key pointers, so it
//! stays meaningful if the catalog database is ever lost.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::camera::CameraMatch;
use crate::config::SidecarConfig;
use crate::error::Result;
use crate::repository::{FileRecord, ProjectRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSnapshot {
    pub id: Option<i64>,
    pub name: String,
    pub medium: String,
    pub confidence: f64,
    pub match_rank: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: i64,
    pub name: String,
    pub folder_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalBlock {
    pub duration_ms: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub frame_rate: Option<f64>,
    pub codec: Option<String>,
    pub bitrate: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionBlock {
    pub medium: String,
    pub detected_make: Option<String>,
    pub detected_model: Option<String>,
    pub detected_lens: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarData {
    pub schema_version: String,
    pub generator_tag: String,
    pub generated_at: DateTime<Utc>,
    pub fingerprint: String,
    pub original_filename: String,
    pub original_path: String,
    pub archive_path: String,
    pub size_bytes: u64,
    pub extension: String,
    pub kind: String,
    pub footage_type: String,
    pub technical: TechnicalBlock,
    pub detection: DetectionBlock,
    pub camera: Option<CameraSnapshot>,
    pub project: Option<ProjectSnapshot>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub imported_at: DateTime<Utc>,
    pub raw_exif: Option<serde_json::Value>,
    pub raw_probe: Option<serde_json::Value>,
}

pub fn sidecar_path_for(archive_path: &Path) -> PathBuf {
    archive_path.with_extension("json")
}

/// Classifies a file's recording time against project key dates into one of a small set
/// of footage-type tags, used to group the manifest and documents by shoot day.
pub fn classify_footage_type(recorded_at: Option<DateTime<Utc>>, key_dates: &serde_json::Value) -> String {
    let Some(recorded_at) = recorded_at else {
        return "other".to_string();
    };
    let date = recorded_at.date_naive();

    let matches_key = |key: &str| -> bool {
        key_dates
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .is_some_and(|d| d == date)
    };

    if matches_key("project_day") {
        "project-day".to_string()
    } else if matches_key("rehearsal_day") {
        "rehearsal-day".to_string()
    } else if matches_key("night_before") {
        "date-night".to_string()
    } else {
        "other".to_string()
    }
}

pub fn build_sidecar_data(
    record: &FileRecord,
    camera_match: &CameraMatch,
    project: Option<ProjectSnapshot>,
    key_dates: &serde_json::Value,
    raw_exif: Option<serde_json::Value>,
    raw_probe: Option<serde_json::Value>,
    cfg: &SidecarConfig,
) -> SidecarData {
    SidecarData {
        schema_version: cfg.schema_version.clone(),
        generator_tag: cfg.generator_tag.clone(),
        generated_at: Utc::now(),
        fingerprint: record.fingerprint.clone(),
        original_filename: record.original_filename.clone(),
        original_path: record.original_path.clone(),
        archive_path: record.archive_path.clone(),
        size_bytes: record.size_bytes,
        extension: record.extension.clone(),
        kind: record.kind.clone(),
        footage_type: classify_footage_type(record.recorded_at, key_dates),
        technical: TechnicalBlock {
            duration_ms: record.duration_ms,
            width: record.width,
            height: record.height,
            frame_rate: record.frame_rate,
            codec: record.codec.clone(),
            bitrate: record.bitrate,
        },
        detection: DetectionBlock {
            medium: record.medium.as_str().to_string(),
            detected_make: record.camera_make.clone(),
            detected_model: record.camera_model.clone(),
            detected_lens: record.lens.clone(),
        },
        camera: camera_match.camera_id.map(|id| CameraSnapshot {
            id: Some(id),
            name: camera_match.camera_name.clone(),
            medium: camera_match.medium.as_str().to_string(),
            confidence: camera_match.confidence,
            match_rank: camera_match.rank.label().to_string(),
        }),
        project,
        recorded_at: record.recorded_at,
        imported_at: record.imported_at,
        raw_exif,
        raw_probe,
    }
}

/// Writes the sidecar for a freshly-finalized file. `project_root` is unused directly here
/// (the archive path is already absolute) but kept in the signature so callers don't need
/// to special-case relative archive paths in the future.
pub fn write_file_sidecar(
    _project_root: &Path,
    record: &FileRecord,
    camera_match: &CameraMatch,
    project: &ProjectRecord,
    raw_exif: Option<serde_json::Value>,
    raw_probe: Option<serde_json::Value>,
    cfg: &SidecarConfig,
) -> Result<()> {
    let snapshot = ProjectSnapshot {
        id: project.id,
        name: project.name.clone(),
        folder_name: project.folder_name.clone(),
    };
    let data = build_sidecar_data(record, camera_match, Some(snapshot), &project.key_dates, raw_exif, raw_probe, cfg);
    write(record, &data)
}

fn write(record: &FileRecord, data: &SidecarData) -> Result<()> {
    let path = sidecar_path_for(Path::new(&record.archive_path));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_path_replaces_extension_with_json() {
        let path = sidecar_path_for(Path::new("/archive/source/modern/sony-a7/abc123.mp4"));
        assert_eq!(path, PathBuf::from("/archive/source/modern/sony-a7/abc123.json"));
    }

    #[test]
    fn footage_type_matches_project_day() {
        let key_dates = serde_json::json!({ "project_day": "2024-06-01" });
        let recorded_at = DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(classify_footage_type(Some(recorded_at), &key_dates), "project-day");
    }

    #[test]
    fn footage_type_defaults_to_other_without_a_match() {
        assert_eq!(classify_footage_type(None, &serde_json::Value::Null), "other");
    }
}
