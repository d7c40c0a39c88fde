//! Structured logging field names shared by every NOsh crate.
//!
//! Use these names for `tracing` fields (directly in macros, or with
//! `Span::record`) so logs can be queried the same way across subsystems.
//! `#[instrument]` attributes spell `subsystem` and `op` directly.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Request failed on our side, or the platform is unreachable |
//! | WARN  | Partial write left behind (orphaned object or auth identity) |
//! | INFO  | Lifecycle events, sign-ups, sign-ins, uploads |
//! | DEBUG | Outbound platform calls and their outcome |
//! | TRACE | Per-row detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "auth", "rest", "storage", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// External auth identity (UUID) of the caller.
pub const AUTH_ID: &str = "auth_id";

/// Local profile row id of the caller.
pub const USER_ID: &str = "user_id";

/// Note row id.
pub const NOTE_ID: &str = "note_id";

/// Room row id.
pub const ROOM_ID: &str = "room_id";

/// Platform table touched by a row call.
pub const TABLE: &str = "table";

/// Storage bucket name.
pub const BUCKET: &str = "bucket";

/// Object path inside a bucket.
pub const STORAGE_PATH: &str = "path";

/// Note pipeline step.
pub const STEP: &str = "step";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// HTTP status returned by the platform.
pub const STATUS: &str = "status";

/// Number of tags attached to a note.
pub const TAG_COUNT: &str = "tag_count";

/// Size of an uploaded object in bytes.
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
