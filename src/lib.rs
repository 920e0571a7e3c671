pub mod config;
pub mod constants;
pub mod disposition_log;
pub mod error;
pub mod fetch;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod table;
pub mod types;
