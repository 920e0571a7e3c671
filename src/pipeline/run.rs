use crate::error::Result;
use crate::metrics::SubmissionMetrics;
use crate::pipeline::aggregate::Progress;
use crate::pipeline::dedup::{Deduplicator, UniqueRecords};
use crate::pipeline::normalize::FieldNormalizer;
use crate::pipeline::submit::SubmissionEngine;
use crate::table;
use crate::types::Row;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{info, instrument};

/// Statistics for one run of the pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Data rows read before deduplication.
    pub initial: usize,
    pub unique: usize,
    /// Jobs that produced an outcome (`success + failure`).
    pub sent: usize,
    pub success: usize,
    pub failure: usize,
    /// Unique records never dispatched because their payload failed to encode.
    pub skipped: usize,
}

impl RunSummary {
    /// `success / sent * 100`, or `None` when nothing was sent.
    pub fn success_rate(&self) -> Option<f64> {
        if self.sent == 0 {
            None
        } else {
            Some(self.success as f64 / self.sent as f64 * 100.0)
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Initial Records: {} / After processed: {} / sent: {} / \
             success: {} / fails: {} / success rate: ",
            self.initial, self.unique, self.sent, self.success, self.failure
        )?;
        match self.success_rate() {
            Some(rate) => write!(f, "{:.2}%", rate),
            None => f.write_str("undefined"),
        }
    }
}

/// Load the table at `path` and run it through the pipeline.
#[instrument(skip(normalizer, engine, progress), fields(path = %path.display()))]
pub async fn process_file(
    path: &Path,
    normalizer: &FieldNormalizer,
    engine: &SubmissionEngine,
    progress: Box<dyn Progress>,
) -> Result<RunSummary> {
    let rows = table::load_rows(path)?;
    info!(rows = rows.len(), "loaded csv records");
    process_rows(rows, normalizer, engine, progress).await
}

/// Normalize, deduplicate and submit `rows` (header first).
pub async fn process_rows(
    mut rows: Vec<Row>,
    normalizer: &FieldNormalizer,
    engine: &SubmissionEngine,
    progress: Box<dyn Progress>,
) -> Result<RunSummary> {
    if rows.len() <= 1 {
        info!("the data file has no record entries, nothing to submit");
        return Ok(RunSummary::default());
    }

    match normalizer.strip_memo_and_stamp(&mut rows) {
        Some(index) => info!(
            index,
            as_of = %normalizer.as_of(),
            "removed Memo field and stamped import date"
        ),
        None => info!("no Memo field in header, rows left unchanged"),
    }

    let mut data = rows.split_off(1);
    drop(rows);

    let replaced = FieldNormalizer::fill_blanks(&mut data);
    info!(replaced, "replaced empty values with \"missing\"");

    let initial = data.len();
    let mut records = UniqueRecords::new();
    let unique = Deduplicator::ingest(&data, &mut records)?;
    drop(data);
    SubmissionMetrics::record_rows(initial, unique);
    info!(removed = initial - unique, unique, "removed duplicated records");

    info!(unique, "submission of records to rest api backend started");
    let report = engine.run(records, progress).await?;
    info!(
        sent = report.tally.sent(),
        skipped = report.skipped,
        "submission of all records completed"
    );

    let summary = RunSummary {
        initial,
        unique,
        sent: report.tally.sent(),
        success: report.tally.success,
        failure: report.tally.failure,
        skipped: report.skipped,
    };
    info!("{}", summary);
    Ok(summary)
}
