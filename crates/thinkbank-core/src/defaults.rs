//! Centralized default constants for thinkbank.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic numbers.

// =============================================================================
// QUEUE
// =============================================================================

/// Capacity of each topic channel. Publishes beyond this are dropped.
pub const QUEUE_CAPACITY: usize = 1000;

/// Topic consumed by the Normalize stage.
pub const TOPIC_NORMALIZE: &str = "normalize_file";

/// Topic consumed by the Embed stage.
pub const TOPIC_EMBED: &str = "embedding_file";

/// Suffix appended to a topic name to form its dead-letter topic.
pub const DEAD_LETTER_SUFFIX: &str = ".dead_letter";

/// Default number of Normalize workers.
pub const NORMALIZE_WORKERS: usize = 3;

/// Default number of Embed workers.
pub const EMBED_WORKERS: usize = 3;

/// Maximum time to wait for workers to drain on shutdown.
pub const QUEUE_DRAIN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// MEDIA
// =============================================================================

/// JPEG quality used for every normalized image.
pub const JPEG_QUALITY: u8 = 90;

/// Extension given to normalized images.
pub const NORMALIZED_EXTENSION: &str = ".jpg";

/// Upper bound on bytes read from a single LIVP archive entry.
pub const LIVP_MAX_ENTRY_BYTES: u64 = 100 * 1024 * 1024;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Fixed embedding dimensionality shared by the whole corpus.
pub const EMBED_DIMENSION: usize = 512;

// =============================================================================
// SEARCH
// =============================================================================

/// Default number of results for text and image search.
pub const SEARCH_TOP_K: usize = 10;

/// Default lexical weight for hybrid fusion.
pub const SEARCH_ALPHA: f64 = 0.5;

/// Text search configuration passed to `websearch_to_tsquery`.
pub const FTS_CONFIG: &str = "english";

/// Default page size for asset listing.
pub const PAGE_LIMIT: i64 = 20;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default inference service base URL.
pub const MODEL_SERVICE_URL: &str = "http://127.0.0.1:8000";

/// Timeout for inference requests in seconds.
pub const MODEL_SERVICE_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// STORAGE
// =============================================================================

/// Root directory for uploaded files.
pub const UPLOAD_ROOT: &str = "./uploads";

/// Route and directory name for original uploads.
pub const ORIGINAL_DIR: &str = "original";

/// Route and directory name for normalized files.
pub const NORMALIZED_DIR: &str = "normalized";

/// Route and directory name for temporary files (search-by-image queries).
pub const TMP_DIR: &str = "tmp";

/// Date layout for storage sub-paths.
pub const DATE_SUBPATH_FORMAT: &str = "%Y/%m/%d";

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Connection floor; the pool grows past it with the worker count.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Connections reserved for upload and search callers on top of the workers.
pub const DB_CALLER_HEADROOM: u32 = 2;

/// Seconds to wait for a free connection.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds an idle connection is kept.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Seconds before a connection is recycled.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// SERVER
// =============================================================================

/// Default bind address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const SERVER_PORT: u16 = 8080;

/// Public base URL under which storage routes are reachable.
pub const BACKEND_URL: &str = "http://localhost:8080";

/// Default database URL for local development.
pub const DATABASE_URL: &str = "postgres://localhost/thinkbank";

/// Maximum accepted request body for uploads (512 MB).
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_BACKEND_URL: &str = "BACKEND_URL";
pub const ENV_UPLOAD_ROOT: &str = "UPLOAD_ROOT";
pub const ENV_MODEL_SERVICE_URL: &str = "MODEL_SERVICE_URL";
pub const ENV_MODEL_SERVICE_TIMEOUT_SECS: &str = "MODEL_SERVICE_TIMEOUT_SECS";
pub const ENV_NORMALIZE_WORKERS: &str = "NORMALIZE_WORKERS";
pub const ENV_EMBED_WORKERS: &str = "EMBED_WORKERS";
pub const ENV_QUEUE_CAPACITY: &str = "QUEUE_CAPACITY";
pub const ENV_QUEUE_FAULT_POLICY: &str = "QUEUE_FAULT_POLICY";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_MAX_UPLOAD_BYTES: &str = "MAX_UPLOAD_BYTES";
pub const ENV_DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
pub const ENV_DB_ACQUIRE_TIMEOUT_SECS: &str = "DB_ACQUIRE_TIMEOUT_SECS";
