//! Structured logging schema and field name constants for thinkbank.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service or fatal fault, requires operator attention |
//! | WARN  | Dropped message, failed stage, fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), stage completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (search hits, archive entries) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "queue", "pipeline", "media", "search", "db", "inference", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "topic_queue", "normalize", "embed", "hybrid_search", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Asset identifier being operated on.
pub const ASSET_ID: &str = "asset_id";

/// Queue topic name.
pub const TOPIC: &str = "topic";

/// Storage path or URL.
pub const PATH: &str = "path";

/// Search query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a payload.
pub const BYTES: &str = "bytes";

// ─── Search-specific fields ────────────────────────────────────────────────

/// Number of lexical results before fusion.
pub const LEXICAL_HITS: &str = "lexical_hits";

/// Number of vector results before fusion.
pub const SEMANTIC_HITS: &str = "semantic_hits";

/// Lexical weight used in hybrid fusion.
pub const ALPHA: &str = "alpha";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
