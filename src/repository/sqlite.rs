//! SQLite adapter implementing the repository traits. SQL style (params!, query_row /
//! query_map with manual struct construction, forward-only migrations gated on
//! `PRAGMA user_version`) is grounded directly on the source tree's `db::schema` and
//! `db::migrations`.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as Json;

use crate::error::{ReelVaultError, Result};
use crate::model::Medium;

use super::{
    CameraPatternRecord, CameraRecord, CameraRepository, DeadLetterEntry, FileRecord,
    FileRepository, ImportSessionRecord, JobKind, JobRecord, JobRepository, JobStatus, NewFileRecord,
    NewJob, NewProjectRecord, ProjectRecord, ProjectRepository, SessionRepository, SessionStatus,
};

const MIGRATIONS: &[&str] = &[
    // 1: core schema
    r#"
    CREATE TABLE projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        folder_name TEXT NOT NULL,
        working_root TEXT NOT NULL,
        key_dates TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE cameras (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        display_name TEXT NOT NULL,
        nickname TEXT,
        medium TEXT NOT NULL CHECK(medium IN ('modern','dadcam','super8')),
        make TEXT,
        model TEXT,
        lut_path TEXT,
        deinterlace INTEGER NOT NULL DEFAULT 0,
        audio_channel_policy TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1,
        system INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE camera_patterns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        camera_id INTEGER NOT NULL REFERENCES cameras(id) ON DELETE CASCADE,
        kind TEXT NOT NULL CHECK(kind IN ('filename','folder','extension')),
        glob TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 100
    );

    CREATE TABLE files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fingerprint TEXT NOT NULL UNIQUE,
        original_filename TEXT NOT NULL,
        original_path TEXT NOT NULL,
        archive_path TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        extension TEXT NOT NULL,
        kind TEXT NOT NULL,
        medium TEXT NOT NULL CHECK(medium IN ('modern','dadcam','super8')),
        camera_id INTEGER REFERENCES cameras(id),
        project_id INTEGER NOT NULL REFERENCES projects(id),
        camera_make TEXT,
        camera_model TEXT,
        lens TEXT,
        width INTEGER,
        height INTEGER,
        duration_ms INTEGER,
        frame_rate REAL,
        codec TEXT,
        bitrate INTEGER,
        recorded_at TEXT,
        imported_at TEXT NOT NULL,
        thumbnail_path TEXT,
        proxy_path TEXT,
        hidden INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE file_metadata (
        file_id INTEGER PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
        exif_blob TEXT,
        probe_blob TEXT
    );

    CREATE TABLE import_sessions (
        id TEXT PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        status TEXT NOT NULL,
        last_completed_stage INTEGER NOT NULL DEFAULT 0,
        resumable INTEGER NOT NULL DEFAULT 1,
        source_paths TEXT NOT NULL,
        archive_path TEXT NOT NULL,
        total_files INTEGER NOT NULL DEFAULT 0,
        processed_files INTEGER NOT NULL DEFAULT 0,
        duplicate_files INTEGER NOT NULL DEFAULT 0,
        error_files INTEGER NOT NULL DEFAULT 0,
        total_bytes INTEGER NOT NULL DEFAULT 0,
        processed_bytes INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT
    );

    CREATE TABLE jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        payload TEXT NOT NULL,
        file_id INTEGER REFERENCES files(id),
        project_id INTEGER REFERENCES projects(id),
        priority INTEGER NOT NULL DEFAULT 0,
        depends_on INTEGER REFERENCES jobs(id),
        status TEXT NOT NULL DEFAULT 'pending',
        retry_count INTEGER NOT NULL DEFAULT 0,
        max_retries INTEGER NOT NULL DEFAULT 3,
        lease_expires_at TEXT,
        not_before TEXT,
        started_at TEXT,
        completed_at TEXT,
        processing_ms INTEGER,
        error TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE dead_letters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        payload TEXT NOT NULL,
        error TEXT NOT NULL,
        acknowledged INTEGER NOT NULL DEFAULT 0
    );
    "#,
];

pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let target = MIGRATIONS.len() as u32;

    if current >= target {
        return Ok(());
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as u32;
        if version <= current {
            continue;
        }
        conn.execute_batch(migration)?;
        conn.execute_batch(&format!("PRAGMA user_version = {version}"))?;
    }

    Ok(())
}

fn medium_to_str(m: Medium) -> &'static str {
    m.as_str()
}

fn medium_from_str(s: &str) -> Medium {
    match s {
        "dadcam" => Medium::Dadcam,
        "super8" => Medium::Super8,
        _ => Medium::Modern,
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    /// Bootstraps the rank-7 default-for-medium fallback cameras against the connection
    /// this repository already wraps.
    pub fn seed_default_cameras(&self) -> Result<()> {
        seed_default_cameras(&self.conn.lock().unwrap())
    }

    /// Dead letters awaiting operator acknowledgement.
    pub fn list_dead_letters(&self) -> Result<Vec<DeadLetterEntry>> {
        list_dead_letters(&self.conn.lock().unwrap())
    }

    fn file_row_to_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
        let medium_str: String = row.get("medium")?;
        let recorded_at: Option<String> = row.get("recorded_at")?;
        let imported_at: String = row.get("imported_at")?;
        Ok(FileRecord {
            id: row.get("id")?,
            fingerprint: row.get("fingerprint")?,
            original_filename: row.get("original_filename")?,
            original_path: row.get("original_path")?,
            archive_path: row.get("archive_path")?,
            size_bytes: row.get::<_, i64>("size_bytes")? as u64,
            extension: row.get("extension")?,
            kind: row.get("kind")?,
            medium: medium_from_str(&medium_str),
            camera_id: row.get("camera_id")?,
            project_id: row.get("project_id")?,
            camera_make: row.get("camera_make")?,
            camera_model: row.get("camera_model")?,
            lens: row.get("lens")?,
            width: row.get("width")?,
            height: row.get("height")?,
            duration_ms: row.get("duration_ms")?,
            frame_rate: row.get("frame_rate")?,
            codec: row.get("codec")?,
            bitrate: row.get("bitrate")?,
            recorded_at: recorded_at.map(|s| parse_rfc3339(&s)),
            imported_at: parse_rfc3339(&imported_at),
            thumbnail_path: row.get("thumbnail_path")?,
            proxy_path: row.get("proxy_path")?,
            hidden: row.get::<_, i64>("hidden")? != 0,
        })
    }
}

impl FileRepository for SqliteRepository {
    fn find_by_hash(&self, fingerprint: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM files WHERE fingerprint = ?1",
            params![fingerprint],
            Self::file_row_to_record,
        )
        .optional()
        .map_err(ReelVaultError::from)
    }

    fn find_by_id(&self, file_id: i64) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM files WHERE id = ?1",
            params![file_id],
            Self::file_row_to_record,
        )
        .optional()
        .map_err(ReelVaultError::from)
    }

    fn create(&self, record: &NewFileRecord) -> Result<FileRecord> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO files (
                fingerprint, original_filename, original_path, archive_path, size_bytes,
                extension, kind, medium, camera_id, project_id, camera_make, camera_model,
                lens, width, height, duration_ms, frame_rate, codec, bitrate, recorded_at,
                imported_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
            params![
                record.fingerprint,
                record.original_filename,
                record.original_path,
                record.archive_path,
                record.size_bytes as i64,
                record.extension,
                record.kind,
                medium_to_str(record.medium),
                record.camera_id,
                record.project_id,
                record.camera_make,
                record.camera_model,
                record.lens,
                record.width,
                record.height,
                record.duration_ms,
                record.frame_rate,
                record.codec,
                record.bitrate,
                record.recorded_at.map(|d| d.to_rfc3339()),
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM files WHERE id = ?1", params![id], Self::file_row_to_record)
            .map_err(ReelVaultError::from)
    }

    fn save_metadata(&self, file_id: i64, exif_blob: Option<&Json>, probe_blob: Option<&Json>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO file_metadata (file_id, exif_blob, probe_blob) VALUES (?1, ?2, ?3)
             ON CONFLICT(file_id) DO UPDATE SET exif_blob = excluded.exif_blob, probe_blob = excluded.probe_blob",
            params![
                file_id,
                exif_blob.map(|v| v.to_string()),
                probe_blob.map(|v| v.to_string()),
            ],
        )?;
        Ok(())
    }

    fn update_thumbnail_path(&self, file_id: i64, path: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE files SET thumbnail_path = ?1 WHERE id = ?2", params![path, file_id])?;
        Ok(())
    }

    fn update_proxy_path(&self, file_id: i64, path: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE files SET proxy_path = ?1 WHERE id = ?2", params![path, file_id])?;
        Ok(())
    }

    fn list_by_project(&self, project_id: i64) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM files WHERE project_id = ?1 ORDER BY imported_at")?;
        let rows = stmt
            .query_map(params![project_id], Self::file_row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl CameraRepository for SqliteRepository {
    fn find_all_with_patterns(&self) -> Result<Vec<CameraRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM cameras ORDER BY id")?;
        let cameras = stmt
            .query_map([], |row| {
                let medium_str: String = row.get("medium")?;
                Ok(CameraRecord {
                    id: row.get("id")?,
                    display_name: row.get("display_name")?,
                    nickname: row.get("nickname")?,
                    medium: medium_from_str(&medium_str),
                    make: row.get("make")?,
                    model: row.get("model")?,
                    patterns: Vec::new(),
                    lut_path: row.get("lut_path")?,
                    deinterlace: row.get::<_, i64>("deinterlace")? != 0,
                    audio_channel_policy: row.get("audio_channel_policy")?,
                    is_default: row.get::<_, i64>("is_default")? != 0,
                    active: row.get::<_, i64>("active")? != 0,
                    system: row.get::<_, i64>("system")? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut result = Vec::with_capacity(cameras.len());
        for mut camera in cameras {
            let mut pstmt = conn.prepare(
                "SELECT kind, glob, priority FROM camera_patterns WHERE camera_id = ?1 ORDER BY priority ASC",
            )?;
            camera.patterns = pstmt
                .query_map(params![camera.id], |row| {
                    Ok(CameraPatternRecord {
                        kind: row.get(0)?,
                        glob: row.get(1)?,
                        priority: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            result.push(camera);
        }
        Ok(result)
    }

    fn find_default_for_medium(&self, medium: Medium) -> Result<Option<CameraRecord>> {
        let all = self.find_all_with_patterns()?;
        Ok(all
            .into_iter()
            .find(|c| c.is_default && c.medium as u8 == medium as u8))
    }
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<ProjectRecord> {
    let key_dates_str: String = row.get("key_dates")?;
    Ok(ProjectRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        folder_name: row.get("folder_name")?,
        working_root: row.get("working_root")?,
        key_dates: serde_json::from_str(&key_dates_str).unwrap_or(Json::Null),
    })
}

impl ProjectRepository for SqliteRepository {
    fn find_by_id(&self, id: i64) -> Result<Option<ProjectRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM projects WHERE id = ?1", params![id], row_to_project)
            .optional()
            .map_err(ReelVaultError::from)
    }

    fn create(&self, new: &NewProjectRecord) -> Result<ProjectRecord> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO projects (name, folder_name, working_root, key_dates) VALUES (?1,?2,?3,?4)",
            params![new.name, new.folder_name, new.working_root, new.key_dates.to_string()],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM projects WHERE id = ?1", params![id], row_to_project)
            .map_err(ReelVaultError::from)
    }

    fn list_all(&self) -> Result<Vec<ProjectRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY id")?;
        Ok(stmt.query_map([], row_to_project)?.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl SessionRepository for SqliteRepository {
    fn upsert(&self, row: &ImportSessionRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO import_sessions (
                id, project_id, status, last_completed_stage, resumable, source_paths,
                archive_path, total_files, processed_files, duplicate_files, error_files,
                total_bytes, processed_bytes, last_error, started_at, completed_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                last_completed_stage = excluded.last_completed_stage,
                resumable = excluded.resumable,
                total_files = excluded.total_files,
                processed_files = excluded.processed_files,
                duplicate_files = excluded.duplicate_files,
                error_files = excluded.error_files,
                total_bytes = excluded.total_bytes,
                processed_bytes = excluded.processed_bytes,
                last_error = excluded.last_error,
                completed_at = excluded.completed_at",
            params![
                row.id,
                row.project_id,
                row.status.as_str(),
                row.last_completed_stage,
                row.resumable as i64,
                serde_json::to_string(&row.source_paths)?,
                row.archive_path,
                row.total_files,
                row.processed_files,
                row.duplicate_files,
                row.error_files,
                row.total_bytes,
                row.processed_bytes,
                row.last_error,
                row.started_at.to_rfc3339(),
                row.completed_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn complete(&self, id: &str, status: SessionStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE import_sessions SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<ImportSessionRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM import_sessions WHERE id = ?1", params![id], row_to_session)
            .optional()
            .map_err(ReelVaultError::from)
    }

    fn find_resumable(&self) -> Result<Vec<ImportSessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM import_sessions WHERE resumable = 1 AND status IN
             ('scanning','hashing','copying','validating','finalizing')",
        )?;
        Ok(stmt.query_map([], row_to_session)?.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_by_project(&self, project_id: i64) -> Result<Vec<ImportSessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM import_sessions WHERE project_id = ?1 ORDER BY started_at")?;
        Ok(stmt
            .query_map(params![project_id], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<ImportSessionRecord> {
    let status_str: String = row.get("status")?;
    let source_paths_str: String = row.get("source_paths")?;
    let started_at: String = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    Ok(ImportSessionRecord {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        status: parse_session_status(&status_str),
        last_completed_stage: row.get("last_completed_stage")?,
        resumable: row.get::<_, i64>("resumable")? != 0,
        source_paths: serde_json::from_str(&source_paths_str).unwrap_or_default(),
        archive_path: row.get("archive_path")?,
        total_files: row.get("total_files")?,
        processed_files: row.get("processed_files")?,
        duplicate_files: row.get("duplicate_files")?,
        error_files: row.get("error_files")?,
        total_bytes: row.get("total_bytes")?,
        processed_bytes: row.get("processed_bytes")?,
        last_error: row.get("last_error")?,
        started_at: parse_rfc3339(&started_at),
        completed_at: completed_at.map(|s| parse_rfc3339(&s)),
    })
}

fn parse_session_status(s: &str) -> SessionStatus {
    match s {
        "scanning" => SessionStatus::Scanning,
        "hashing" => SessionStatus::Hashing,
        "copying" => SessionStatus::Copying,
        "validating" => SessionStatus::Validating,
        "finalizing" => SessionStatus::Finalizing,
        "completed" => SessionStatus::Completed,
        "paused" => SessionStatus::Paused,
        "failed" => SessionStatus::Failed,
        "cancelled" => SessionStatus::Cancelled,
        _ => SessionStatus::Pending,
    }
}

fn parse_job_kind(s: &str) -> JobKind {
    match s {
        "thumbnail" => JobKind::Thumbnail,
        "proxy" => JobKind::Proxy,
        "ml_extract" => JobKind::MlExtract,
        _ => JobKind::Integrity,
    }
}

fn parse_job_status(s: &str) -> JobStatus {
    match s {
        "processing" => JobStatus::Processing,
        "complete" => JobStatus::Complete,
        "error" => JobStatus::Error,
        "dead" => JobStatus::Dead,
        _ => JobStatus::Pending,
    }
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
    let kind_str: String = row.get("kind")?;
    let status_str: String = row.get("status")?;
    let payload_str: String = row.get("payload")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    Ok(JobRecord {
        id: row.get("id")?,
        kind: parse_job_kind(&kind_str),
        payload: serde_json::from_str(&payload_str).unwrap_or(Json::Null),
        file_id: row.get("file_id")?,
        project_id: row.get("project_id")?,
        priority: row.get("priority")?,
        depends_on: row.get("depends_on")?,
        status: parse_job_status(&status_str),
        retry_count: row.get("retry_count")?,
        max_retries: row.get("max_retries")?,
        started_at: started_at.map(|s| parse_rfc3339(&s)),
        completed_at: completed_at.map(|s| parse_rfc3339(&s)),
        processing_ms: row.get("processing_ms")?,
        error: row.get("error")?,
    })
}

impl JobRepository for SqliteRepository {
    fn create(&self, job: &NewJob) -> Result<JobRecord> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (kind, payload, file_id, project_id, priority, depends_on, max_retries, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                job.kind.as_str(),
                job.payload.to_string(),
                job.file_id,
                job.project_id,
                job.priority,
                job.depends_on,
                job.max_retries,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], row_to_job)
            .map_err(ReelVaultError::from)
    }

    fn find_pending(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT j.* FROM jobs j
             WHERE j.status = 'pending'
               AND (j.not_before IS NULL OR j.not_before <= ?2)
               AND (j.depends_on IS NULL OR EXISTS (
                     SELECT 1 FROM jobs d WHERE d.id = j.depends_on AND d.status = 'complete'))
             ORDER BY j.priority DESC, j.id ASC
             LIMIT ?1",
        )?;
        Ok(stmt
            .query_map(params![limit as i64, Utc::now().to_rfc3339()], row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn claim(&self, id: i64, lease_seconds: i64) -> Result<Option<JobRecord>> {
        let conn = self.conn.lock().unwrap();
        let lease_expires = (Utc::now() + chrono::Duration::seconds(lease_seconds)).to_rfc3339();
        let updated = conn.execute(
            "UPDATE jobs SET status = 'processing', started_at = ?1, lease_expires_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![Utc::now().to_rfc3339(), lease_expires, id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        conn.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], row_to_job)
            .optional()
            .map_err(ReelVaultError::from)
    }

    fn complete(&self, id: i64, processing_ms: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET status = 'complete', completed_at = ?1, processing_ms = ?2 WHERE id = ?3",
            params![Utc::now().to_rfc3339(), processing_ms, id],
        )?;
        Ok(())
    }

    fn fail(&self, id: i64, message: &str, base_backoff_seconds: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let (retry_count, max_retries, kind_str, payload_str): (i32, i32, String, String) = conn.query_row(
            "SELECT retry_count, max_retries, kind, payload FROM jobs WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let next_retry_count = retry_count + 1;
        if next_retry_count > max_retries {
            conn.execute(
                "UPDATE jobs SET status = 'dead', error = ?1, retry_count = ?2 WHERE id = ?3",
                params![message, next_retry_count, id],
            )?;
            conn.execute(
                "INSERT INTO dead_letters (job_id, kind, payload, error) VALUES (?1,?2,?3,?4)",
                params![id, kind_str, payload_str, message],
            )?;
        } else {
            let backoff_seconds = base_backoff_seconds * 2i64.pow((next_retry_count - 1).max(0) as u32);
            let not_before = (Utc::now() + chrono::Duration::seconds(backoff_seconds)).to_rfc3339();
            conn.execute(
                "UPDATE jobs SET status = 'pending', retry_count = ?1, error = ?2, not_before = ?3 WHERE id = ?4",
                params![next_retry_count, message, not_before, id],
            )?;
        }
        Ok(())
    }

    fn dead_letter(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let (kind_str, payload_str): (String, String) = conn.query_row(
            "SELECT kind, payload FROM jobs WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        conn.execute("UPDATE jobs SET status = 'dead', error = ?1 WHERE id = ?2", params![error, id])?;
        conn.execute(
            "INSERT INTO dead_letters (job_id, kind, payload, error) VALUES (?1,?2,?3,?4)",
            params![id, kind_str, payload_str, error],
        )?;
        Ok(())
    }

    fn acknowledge(&self, ids: &[i64]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for id in ids {
            conn.execute("UPDATE dead_letters SET acknowledged = 1 WHERE id = ?1", params![id])?;
        }
        Ok(())
    }

    fn reclaim_expired(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE jobs SET status = 'pending' WHERE status = 'processing' AND lease_expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(n)
    }

    fn list(&self, status: Option<JobStatus>) -> Result<Vec<JobRecord>> {
        let conn = self.conn.lock().unwrap();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare("SELECT * FROM jobs WHERE status = ?1 ORDER BY id DESC")?;
                Ok(stmt
                    .query_map(params![status.as_str()], row_to_job)?
                    .collect::<rusqlite::Result<Vec<_>>>()?)
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY id DESC")?;
                Ok(stmt.query_map([], row_to_job)?.collect::<rusqlite::Result<Vec<_>>>()?)
            }
        }
    }

    fn retry_dead_letter(&self, id: Option<i64>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT dl.id, dl.kind, dl.payload, j.file_id, j.project_id
             FROM dead_letters dl JOIN jobs j ON j.id = dl.job_id
             WHERE dl.acknowledged = 0 AND (?1 IS NULL OR dl.id = ?1)",
        )?;
        let entries = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (dead_letter_id, kind_str, payload_str, file_id, project_id) in &entries {
            conn.execute(
                "INSERT INTO jobs (kind, payload, file_id, project_id, priority, max_retries, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7)",
                params![
                    kind_str,
                    payload_str,
                    file_id,
                    project_id,
                    parse_job_kind(kind_str).default_priority(),
                    3,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            conn.execute("UPDATE dead_letters SET acknowledged = 1 WHERE id = ?1", params![dead_letter_id])?;
        }
        Ok(entries.len())
    }
}

/// Test/bootstrap helper: inserts a single project row so callers that only need a valid
/// `project_id` foreign key don't have to go through the full project-creation flow.
pub fn seed_default_project(conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO projects (name, folder_name, working_root, key_dates) VALUES (?1,?2,?3,?4)",
        params!["Untitled Project", "untitled-project", ".", "{}"],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts the rank-7 "default for medium" fallback camera for each medium, if none exists
/// yet -- startup seeding narrowed to this crate's three-medium model instead of a bundled
/// JSON catalog of real camera profiles.
pub fn seed_default_cameras(conn: &Connection) -> Result<()> {
    let defaults = [
        ("Unidentified Modern Camera", "Modern Default", "modern"),
        ("Unidentified Camcorder", "Dadcam Default", "dadcam"),
        ("Unidentified Super 8 Scan", "Super8 Default", "super8"),
    ];

    for (display_name, nickname, medium) in defaults {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cameras WHERE medium = ?1 AND is_default = 1)",
            params![medium],
            |row| row.get(0),
        )?;
        if exists {
            continue;
        }
        conn.execute(
            "INSERT INTO cameras (display_name, nickname, medium, is_default, active, system)
             VALUES (?1,?2,?3,1,1,1)",
            params![display_name, nickname, medium],
        )?;
    }
    Ok(())
}

pub fn list_dead_letters(conn: &Connection) -> Result<Vec<DeadLetterEntry>> {
    let mut stmt = conn.prepare("SELECT id, job_id, kind, payload, error, acknowledged FROM dead_letters")?;
    Ok(stmt
        .query_map([], |row| {
            let kind_str: String = row.get(2)?;
            let payload_str: String = row.get(3)?;
            Ok(DeadLetterEntry {
                id: row.get(0)?,
                job_id: row.get(1)?,
                kind: parse_job_kind(&kind_str),
                payload: serde_json::from_str(&payload_str).unwrap_or(Json::Null),
                error: row.get(4)?,
                acknowledged: row.get::<_, i64>(5)? != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_create_expected_tables() {
        let conn = open_in_memory().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='files'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn find_by_hash_returns_none_when_absent() {
        let conn = open_in_memory().unwrap();
        let repo = SqliteRepository::new(conn);
        assert!(repo.find_by_hash("deadbeefdeadbeef").unwrap().is_none());
    }
}
