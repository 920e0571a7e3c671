// Record pipeline: normalize -> dedupe -> submit -> aggregate

pub mod aggregate;
pub mod dedup;
pub mod normalize;
pub mod run;
pub mod submit;

// Re-export key types from each stage
pub use aggregate::{Aggregator, ConsoleProgress, Progress, Tally};
pub use dedup::{Deduplicator, UniqueRecords};
pub use normalize::FieldNormalizer;
pub use run::{process_file, process_rows, RunSummary};
pub use submit::{
    classify_response, worker_count, EngineReport, HttpSubmitter, JsonEnvelopeEncoder,
    RecordEncoder, ResponseClass, SubmissionEngine, Submitter,
};
