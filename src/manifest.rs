//! Project documents writer. Produces the human- and machine-readable summary of a
//! project's archive under `<workingRoot>/<projectFolder>/documents/`: `manifest.json`,
//! `project.json`, `cameras.json`, `import-log.json`, and a humanised `README.txt`.
//! `refresh_manifest` is split out from `write_all_documents` so a session can cheaply
//! refresh just the manifest after every run without rewriting documents that haven't
//! changed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DOCUMENTS_FOLDER;
use crate::error::Result;
use crate::repository::{CameraRecord, FileRecord, ImportSessionRecord, ProjectRecord};
use crate::sidecar::classify_footage_type;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub fingerprint: String,
    pub relative_path: String,
    pub original_filename: String,
    pub size_bytes: u64,
    pub medium: String,
    pub footage_type: String,
    pub camera_id: Option<i64>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Totals {
    pub file_count: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub project_id: i64,
    pub files: Vec<ManifestEntry>,
    pub totals_by_medium: BTreeMap<String, Totals>,
    pub totals_by_footage_type: BTreeMap<String, Totals>,
    pub totals_by_camera: BTreeMap<String, Totals>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraUsage {
    pub camera_id: i64,
    pub display_name: String,
    pub file_count: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamerasDocument {
    pub generated_at: DateTime<Utc>,
    pub cameras: Vec<CameraUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLogDocument {
    pub generated_at: DateTime<Utc>,
    pub sessions: Vec<ImportLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub session_id: String,
    pub status: String,
    pub total_files: i64,
    pub processed_files: i64,
    pub duplicate_files: i64,
    pub error_files: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub id: i64,
    pub name: String,
    pub folder_name: String,
    pub key_dates: serde_json::Value,
}

fn documents_dir(project_root: &Path) -> PathBuf {
    project_root.join(DOCUMENTS_FOLDER)
}

fn relative_path(archive_path: &str, project_root: &Path) -> String {
    Path::new(archive_path)
        .strip_prefix(project_root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| archive_path.to_string())
}

pub fn build_manifest(project_root: &Path, project: &ProjectRecord, files: &[FileRecord]) -> Manifest {
    let mut totals_by_medium: BTreeMap<String, Totals> = BTreeMap::new();
    let mut totals_by_footage_type: BTreeMap<String, Totals> = BTreeMap::new();
    let mut totals_by_camera: BTreeMap<String, Totals> = BTreeMap::new();
    let mut entries = Vec::with_capacity(files.len());

    for file in files {
        let footage_type = classify_footage_type(file.recorded_at, &project.key_dates);
        let medium = file.medium.as_str().to_string();
        let camera_key = file.camera_id.map(|id| id.to_string()).unwrap_or_else(|| "unidentified".to_string());

        bump(&mut totals_by_medium, &medium, file.size_bytes);
        bump(&mut totals_by_footage_type, &footage_type, file.size_bytes);
        bump(&mut totals_by_camera, &camera_key, file.size_bytes);

        entries.push(ManifestEntry {
            fingerprint: file.fingerprint.clone(),
            relative_path: relative_path(&file.archive_path, project_root),
            original_filename: file.original_filename.clone(),
            size_bytes: file.size_bytes,
            medium,
            footage_type,
            camera_id: file.camera_id,
            recorded_at: file.recorded_at,
        });
    }

    Manifest {
        generated_at: Utc::now(),
        project_id: project.id,
        files: entries,
        totals_by_medium,
        totals_by_footage_type,
        totals_by_camera,
    }
}

fn bump(totals: &mut BTreeMap<String, Totals>, key: &str, size_bytes: u64) {
    let entry = totals.entry(key.to_string()).or_default();
    entry.file_count += 1;
    entry.total_bytes += size_bytes;
}

/// Rewrites only `manifest.json`. Cheap enough to call after every import session without
/// touching the other, slower-changing documents.
pub fn refresh_manifest(project_root: &Path, project: &ProjectRecord, files: &[FileRecord]) -> Result<()> {
    let manifest = build_manifest(project_root, project, files);
    write_json(&documents_dir(project_root).join("manifest.json"), &manifest)
}

fn build_cameras_document(files: &[FileRecord], cameras: &[CameraRecord]) -> CamerasDocument {
    let mut usage: BTreeMap<i64, (u64, u64)> = BTreeMap::new();
    for file in files {
        if let Some(camera_id) = file.camera_id {
            let entry = usage.entry(camera_id).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += file.size_bytes;
        }
    }

    let mut contributing: Vec<CameraUsage> = usage
        .into_iter()
        .filter_map(|(camera_id, (count, bytes))| {
            cameras.iter().find(|c| c.id == camera_id).map(|camera| CameraUsage {
                camera_id,
                display_name: camera.display_name.clone(),
                file_count: count,
                total_bytes: bytes,
            })
        })
        .collect();
    contributing.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));

    CamerasDocument {
        generated_at: Utc::now(),
        cameras: contributing,
    }
}

fn build_import_log(sessions: &[ImportSessionRecord]) -> ImportLogDocument {
    ImportLogDocument {
        generated_at: Utc::now(),
        sessions: sessions
            .iter()
            .map(|s| ImportLogEntry {
                session_id: s.id.clone(),
                status: s.status.as_str().to_string(),
                total_files: s.total_files,
                processed_files: s.processed_files,
                duplicate_files: s.duplicate_files,
                error_files: s.error_files,
                started_at: s.started_at,
                completed_at: s.completed_at,
            })
            .collect(),
    }
}

fn build_readme(project: &ProjectRecord, manifest: &Manifest, cameras: &CamerasDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", project.name));
    out.push_str(&"=".repeat(project.name.len()));
    out.push_str("\n\n");
    out.push_str(&format!("{} files archived.\n\n", manifest.files.len()));

    out.push_str("By medium:\n");
    for (medium, totals) in &manifest.totals_by_medium {
        out.push_str(&format!("  {medium}: {} files, {} bytes\n", totals.file_count, totals.total_bytes));
    }

    out.push_str("\nBy footage type:\n");
    for (footage_type, totals) in &manifest.totals_by_footage_type {
        out.push_str(&format!("  {footage_type}: {} files, {} bytes\n", totals.file_count, totals.total_bytes));
    }

    out.push_str("\nCameras:\n");
    for camera in &cameras.cameras {
        out.push_str(&format!("  {}: {} files, {} bytes\n", camera.display_name, camera.file_count, camera.total_bytes));
    }

    out
}

/// Writes every project document: manifest, project, cameras, import log, and README.
pub fn write_all_documents(
    project_root: &Path,
    project: &ProjectRecord,
    files: &[FileRecord],
    cameras: &[CameraRecord],
    sessions: &[ImportSessionRecord],
) -> Result<()> {
    let dir = documents_dir(project_root);
    fs::create_dir_all(&dir)?;

    let manifest = build_manifest(project_root, project, files);
    write_json(&dir.join("manifest.json"), &manifest)?;

    let project_doc = ProjectDocument {
        id: project.id,
        name: project.name.clone(),
        folder_name: project.folder_name.clone(),
        key_dates: project.key_dates.clone(),
    };
    write_json(&dir.join("project.json"), &project_doc)?;

    let cameras_doc = build_cameras_document(files, cameras);
    write_json(&dir.join("cameras.json"), &cameras_doc)?;

    let import_log = build_import_log(sessions);
    write_json(&dir.join("import-log.json"), &import_log)?;

    let readme = build_readme(project, &manifest, &cameras_doc);
    fs::write(dir.join("README.txt"), readme)?;

    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Medium;

    fn sample_file(id: i64, camera_id: Option<i64>, size_bytes: u64) -> FileRecord {
        FileRecord {
            id,
            fingerprint: format!("fp{id}"),
            original_filename: format!("clip{id}.mp4"),
            original_path: format!("/src/clip{id}.mp4"),
            archive_path: format!("/archive/source/modern/cam/fp{id}.mp4"),
            size_bytes,
            extension: "mp4".into(),
            kind: "video".into(),
            medium: Medium::Modern,
            camera_id,
            project_id: 1,
            camera_make: None,
            camera_model: None,
            lens: None,
            width: None,
            height: None,
            duration_ms: None,
            frame_rate: None,
            codec: None,
            bitrate: None,
            recorded_at: None,
            imported_at: Utc::now(),
            thumbnail_path: None,
            proxy_path: None,
            hidden: false,
        }
    }

    fn sample_project() -> ProjectRecord {
        ProjectRecord {
            id: 1,
            name: "Test Project".into(),
            folder_name: "test-project".into(),
            working_root: "/archive".into(),
            key_dates: serde_json::Value::Null,
        }
    }

    #[test]
    fn manifest_aggregates_totals_by_medium() {
        let files = vec![sample_file(1, Some(1), 100), sample_file(2, Some(1), 200)];
        let manifest = build_manifest(Path::new("/archive"), &sample_project(), &files);
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.totals_by_medium.get("modern").unwrap().total_bytes, 300);
    }

    #[test]
    fn cameras_document_only_lists_contributing_cameras() {
        let files = vec![sample_file(1, Some(1), 100)];
        let cameras = vec![CameraRecord {
            id: 1,
            display_name: "Sony A7 III".into(),
            nickname: None,
            medium: Medium::Modern,
            make: None,
            model: None,
            patterns: Vec::new(),
            lut_path: None,
            deinterlace: false,
            audio_channel_policy: None,
            is_default: false,
            active: true,
            system: false,
        }];
        let doc = build_cameras_document(&files, &cameras);
        assert_eq!(doc.cameras.len(), 1);
        assert_eq!(doc.cameras[0].display_name, "Sony A7 III");
    }
}
