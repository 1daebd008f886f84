//! Library root for the ingest engine: declares the module graph and `AppContext`, the
//! explicit service container every entry point builds once and threads through by
//! reference, instead of reaching for ambient globals or thread-local state. A value
//! any caller -- the CLI here, a future GUI, or a test -- constructs for itself.

pub mod background_service;
pub mod camera;
pub mod config;
pub mod constants;
pub mod copy;
pub mod error;
pub mod finalize;
pub mod hash;
pub mod jobs;
pub mod manifest;
pub mod metadata;
pub mod model;
pub mod preview;
pub mod repository;
pub mod scan;
pub mod session;
pub mod sidecar;
pub mod storage_profile;
pub mod tools;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::background_service::BackgroundService;
use crate::config::Config;
use crate::error::Result;
use crate::metadata::MetadataProvider;
use crate::repository::sqlite::{self, SqliteRepository};

/// Built once per process and handed to every component that needs storage, configuration,
/// or the ML-extractor lifecycle; nothing in this crate reaches for a global instead. `repo`
/// is `Arc`-wrapped so a long-lived worker pool can hold its own strong reference across
/// threads while the CLI keeps using it synchronously through the same `AppContext`.
pub struct AppContext {
    pub config: Config,
    pub repo: Arc<SqliteRepository>,
    pub providers: Vec<Box<dyn MetadataProvider>>,
    pub ml_service: Option<Arc<Mutex<BackgroundService>>>,
}

impl AppContext {
    /// Opens (creating on first run) the catalog database at `<catalog_root>/<CATALOG_FOLDER>/<DB_FILENAME>`,
    /// loads configuration layered under `catalog_root`, and seeds the rank-7 default-for-medium
    /// cameras. The ML-extractor service is constructed but not started -- callers that need it
    /// opt in explicitly via `start_ml_service`.
    pub fn open(catalog_root: &Path) -> Result<Self> {
        let catalog_dir = catalog_root.join(constants::CATALOG_FOLDER);
        std::fs::create_dir_all(&catalog_dir)?;

        let config = Config::load(Some(&Config::default_path_in(catalog_root)))?;
        let conn = sqlite::open(&catalog_dir.join(constants::DB_FILENAME))?;
        sqlite::seed_default_cameras(&conn)?;
        let repo = Arc::new(SqliteRepository::new(conn));

        let ml_service = Some(Arc::new(Mutex::new(BackgroundService::new(
            catalog_dir.join("ml-extractor.pid"),
            config.ml_service.clone(),
        ))));

        Ok(Self {
            config,
            repo,
            providers: metadata::default_providers(),
            ml_service,
        })
    }

    /// In-memory variant for tests: no filesystem catalog, compiled-in config defaults.
    pub fn open_in_memory() -> Result<Self> {
        let conn = sqlite::open_in_memory()?;
        sqlite::seed_default_cameras(&conn)?;
        let repo = Arc::new(SqliteRepository::new(conn));
        let config = Config::default();
        let ml_service = Some(Arc::new(Mutex::new(BackgroundService::new(
            PathBuf::from("/tmp/reelvault-test-ml.pid"),
            config.ml_service.clone(),
        ))));

        Ok(Self {
            config,
            repo,
            providers: metadata::default_providers(),
            ml_service,
        })
    }

    /// Reaps any ML-extractor PID file orphaned by a previous crash, then spawns and
    /// health-checks a fresh instance at `executable`.
    pub fn start_ml_service(&self, executable: &Path, args: &[String]) -> Result<()> {
        let Some(service) = &self.ml_service else {
            return Err(error::ReelVaultError::Lifecycle("no ML-extractor service configured".into()));
        };
        let mut guard = service.lock().unwrap();
        guard.reap_orphan()?;
        guard.start(executable, args)
    }

    pub fn stop_ml_service(&self) -> Result<()> {
        let Some(service) = &self.ml_service else {
            return Ok(());
        };
        service.lock().unwrap().stop()
    }
}
