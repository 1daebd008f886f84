// Layered configuration: compiled-in defaults, optional TOML file, then environment
// overrides. Components never read an environment variable themselves; only
// `Config::load` does, through the `config` crate's `Environment` source with a
// fixed, non-wildcard prefix.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::Result;

const ENV_PREFIX: &str = "REELVAULT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageProfileConfig {
    pub local_buffer_bytes: usize,
    pub network_buffer_bytes: usize,
    pub local_concurrency: usize,
    pub network_concurrency: usize,
    pub network_inter_op_delay_ms: u64,
    pub network_retry_delays_ms: Vec<u64>,
}

impl Default for StorageProfileConfig {
    fn default() -> Self {
        Self {
            local_buffer_bytes: LOCAL_BUFFER_BYTES,
            network_buffer_bytes: NETWORK_BUFFER_BYTES,
            local_concurrency: LOCAL_COPY_CONCURRENCY,
            network_concurrency: NETWORK_COPY_CONCURRENCY,
            network_inter_op_delay_ms: NETWORK_INTER_OP_DELAY_MS,
            network_retry_delays_ms: DEFAULT_RETRY_DELAYS_NETWORK_MS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    pub abort_threshold: u32,
    pub temp_suffix: String,
    pub auto_rollback: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            abort_threshold: DEFAULT_ABORT_THRESHOLD,
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            auto_rollback: DEFAULT_AUTO_ROLLBACK,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobQueueConfig {
    pub poll_interval_ms: u64,
    pub cap_light: usize,
    pub cap_medium: usize,
    pub cap_heavy: usize,
    pub default_max_retries: i32,
    pub base_backoff_seconds: i64,
    pub lease_duration_seconds: i64,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            cap_light: JOB_CAP_LIGHT,
            cap_medium: JOB_CAP_MEDIUM,
            cap_heavy: JOB_CAP_HEAVY,
            default_max_retries: JOB_MAX_RETRIES,
            base_backoff_seconds: JOB_BASE_BACKOFF_SECONDS,
            lease_duration_seconds: JOB_LEASE_DURATION_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    pub schema_version: String,
    pub generator_tag: String,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generator_tag: DEFAULT_GENERATOR_TAG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MlServiceConfig {
    pub health_url: String,
    pub startup_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub health_poll_interval_ms: u64,
}

impl Default for MlServiceConfig {
    fn default() -> Self {
        Self {
            health_url: "http://127.0.0.1:8731/health".to_string(),
            startup_timeout_seconds: ML_SERVICE_STARTUP_TIMEOUT_SECONDS,
            idle_timeout_seconds: ML_SERVICE_IDLE_TIMEOUT_SECONDS,
            health_poll_interval_ms: ML_SERVICE_HEALTH_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub catalog_folder: String,
    pub db_filename: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog_folder: CATALOG_FOLDER.to_string(),
            db_filename: DB_FILENAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_profile: StorageProfileConfig,
    pub copy: CopyConfig,
    pub job_queue: JobQueueConfig,
    pub sidecar: SidecarConfig,
    pub ml_service: MlServiceConfig,
    pub paths: PathsConfig,
}

impl Config {
    /// Load defaults, then merge an optional TOML file, then `REELVAULT_*` env overrides
    /// (e.g. `REELVAULT_COPY__ABORT_THRESHOLD=3`).
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = toml_path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn default_path_in(working_root: &Path) -> PathBuf {
        working_root.join("reelvault.toml")
    }
}
