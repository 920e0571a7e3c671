//! Fixed values shared across the pipeline stages.

// Input table
pub const MEMO_COLUMN: &str = "Memo";
pub const MISSING_VALUE: &str = "missing";
pub const RECORD_FIELD_COUNT: usize = 12;

// Defaults for the configurable settings
pub const DEFAULT_SOURCE_URL: &str = "https://s3.amazonaws.com/ecompany/data.csv";
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

// Outbound submission
pub const API_KEY_HEADER: &str = "X-API-KEY";
/// Transport status codes accepted without inspecting the body.
pub const ACCEPTED_TRANSPORT_STATUSES: [u16; 2] = [200, 201];
/// `status` values inside a JSON response body that count as accepted.
pub const ACCEPTED_BODY_STATUSES: [i64; 2] = [200, 202];

// Run directory layout
pub const RUN_DIR_PREFIX: &str = "log@";
pub const DETAILS_LOG_FILE: &str = "details.log";
pub const DISPOSITION_LOG_FILE: &str = "statistics.log";

/// As-of date format stamped into every record (MM/DD/YYYY).
pub const IMPORT_DATE_FORMAT: &str = "%m/%d/%Y";

// Environment variable names
pub const ENV_SOURCE_URL: &str = "EPROCESSOR_SOURCE_URL";
pub const ENV_API_URL: &str = "EPROCESSOR_API_URL";
pub const ENV_API_KEY: &str = "EPROCESSOR_API_KEY";
pub const ENV_MAX_WORKERS: &str = "EPROCESSOR_MAX_WORKERS";
pub const ENV_TIMEOUT_SECS: &str = "EPROCESSOR_TIMEOUT_SECS";
pub const ENV_METRICS_ADDR: &str = "EPROCESSOR_METRICS_ADDR";
