use crate::metrics::SubmissionMetrics;
use std::io::Write;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// Receives a live `consumed/expected` update after every outcome.
pub trait Progress: Send {
    fn update(&mut self, consumed: usize, expected: usize);

    /// Called once after the last outcome.
    fn finish(&mut self) {}
}

/// Percentage of `expected` reached; zero when nothing is expected.
pub fn progress_percent(consumed: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    consumed as f64 / expected as f64 * 100.0
}

/// Rewrites a single stdout line in place.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn update(&mut self, consumed: usize, expected: usize) {
        let mut out = std::io::stdout().lock();
        let _ = write!(
            out,
            "\t[+] please wait ... all records submission progression : {:.2}% [{}/{}]\r",
            progress_percent(consumed, expected),
            consumed,
            expected
        );
        let _ = out.flush();
    }

    fn finish(&mut self) {
        println!();
    }
}

/// Final success/failure counts, readable only once the aggregator is done.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub success: usize,
    pub failure: usize,
}

impl Tally {
    /// Dispatched jobs that produced an outcome.
    pub fn sent(&self) -> usize {
        self.success + self.failure
    }
}

/// Sole consumer of the outcome stream and sole owner of the counters.
pub struct Aggregator {
    expected: usize,
    progress: Box<dyn Progress>,
}

impl Aggregator {
    /// `expected` is the unique-record count, not the dispatched-job count.
    pub fn new(expected: usize, progress: Box<dyn Progress>) -> Self {
        Self { expected, progress }
    }

    /// Spawn the aggregator task. The returned receiver resolves with the
    /// tally exactly once, after the outcome channel has closed and drained.
    pub fn spawn(
        self,
        outcomes: mpsc::Receiver<bool>,
    ) -> (oneshot::Receiver<Tally>, JoinHandle<()>) {
        let (done_tx, done_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(outcomes, done_tx));
        (done_rx, handle)
    }

    pub async fn run(mut self, mut outcomes: mpsc::Receiver<bool>, done: oneshot::Sender<Tally>) {
        let mut tally = Tally::default();

        while let Some(accepted) = outcomes.recv().await {
            if accepted {
                tally.success += 1;
            } else {
                tally.failure += 1;
            }
            SubmissionMetrics::record_outcome(accepted);
            self.progress.update(tally.sent(), self.expected);
        }

        self.progress.finish();
        debug!(success = tally.success, failure = tally.failure, "outcome stream drained");
        // The orchestrator may have given up waiting; nothing left to report to.
        let _ = done.send(tally);
    }
}
