// Archive and pipeline constants. Do not change without updating the archive layout docs.

pub const PIPELINE_VERSION: u32 = 1;

// Hashing
pub const HASH_ALGORITHM: &str = "blake3";
pub const HASH_ALGORITHM_ID: &str = "blake3-trunc64";
pub const HASH_CHUNK_SIZE: usize = 1_048_576; // 1MB
pub const FINGERPRINT_HEX_LEN: usize = 16;

// Concurrency defaults
pub const LOCAL_COPY_CONCURRENCY: usize = 4;
pub const NETWORK_COPY_CONCURRENCY: usize = 1;
pub const JOB_CAP_LIGHT: usize = 4;
pub const JOB_CAP_MEDIUM: usize = 2;
pub const JOB_CAP_HEAVY: usize = 1;

// Paths
pub const CATALOG_FOLDER: &str = ".reelvault";
pub const DB_FILENAME: &str = "reelvault.db";
pub const SOURCE_FOLDER: &str = "source";
pub const THUMBNAILS_FOLDER: &str = "thumbnails";
pub const GALLERY_FOLDER: &str = "gallery";
pub const PROXIES_FOLDER: &str = "proxies";
pub const DOCUMENTS_FOLDER: &str = "documents";

// Time
pub const TIMESTAMP_PRECEDENCE: [&str; 3] = ["metadata", "folder", "filesystem"];

// Proxy settings
pub const PROXY_CODEC: &str = "h264";
pub const PROXY_RESOLUTION: u32 = 720;
pub const PROXY_CRF: u32 = 23;

// Thumbnail settings
pub const THUMB_FORMAT: &str = "jpg";
pub const THUMB_QUALITY: u32 = 85;
pub const GALLERY_PERCENTILES: [u32; 3] = [25, 50, 75];

// Sidecar / manifest schema
pub const SCHEMA_VERSION: &str = "1.0";
pub const DEFAULT_GENERATOR_TAG: &str = "reelvault-ingest";

// Copy engine
pub const DEFAULT_ABORT_THRESHOLD: u32 = 5;
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";
pub const DEFAULT_AUTO_ROLLBACK: bool = true;
pub const DEFAULT_RETRY_DELAYS_NETWORK_MS: [u64; 5] = [250, 500, 1000, 2000, 4000];
pub const LOCAL_BUFFER_BYTES: usize = 64 * 1024;
pub const NETWORK_BUFFER_BYTES: usize = 1024 * 1024;
pub const NETWORK_INTER_OP_DELAY_MS: u64 = 10;

// Job queue
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const JOB_MAX_RETRIES: i32 = 3;
pub const JOB_BASE_BACKOFF_SECONDS: i64 = 60;
pub const JOB_LEASE_DURATION_SECONDS: i64 = 300; // 5 minutes
pub const JOB_HEARTBEAT_INTERVAL_SECONDS: i64 = 30;

// Background-service lifecycle (ML extractor)
pub const ML_SERVICE_STARTUP_TIMEOUT_SECONDS: u64 = 30;
pub const ML_SERVICE_IDLE_TIMEOUT_SECONDS: u64 = 300;
pub const ML_SERVICE_HEALTH_POLL_INTERVAL_MS: u64 = 250;
pub const ORPHAN_STALE_THRESHOLD_SECONDS: i64 = 7 * 24 * 60 * 60;

// Sidecar extensions (files to copy alongside videos)
pub const SIDECAR_EXTENSIONS: [&str; 6] = ["thm", "xml", "xmp", "srt", "lrf", "idx"];

// Video extensions (primary supported formats)
pub const VIDEO_EXTENSIONS: [&str; 20] = [
    "mp4", "mov", "avi", "mkv", "mts", "m2ts", "mxf", "mpg", "mpeg", "wmv", "flv", "webm", "3gp",
    "m4v", "ts", "vob", "mod", "tod", "dv", "ogv",
];

// Audio extensions
pub const AUDIO_EXTENSIONS: [&str; 8] =
    ["mp3", "wav", "aac", "flac", "m4a", "ogg", "wma", "aiff"];

// Image extensions
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];
