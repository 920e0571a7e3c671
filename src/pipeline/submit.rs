//! Submission engine: a bounded worker pool posting one job per unique record.
//!
//! One producer encodes records into jobs, `W` workers drain the shared job
//! queue and emit a boolean outcome each, and a single aggregator tallies the
//! outcomes. The run only reports once the aggregator has signalled that it
//! consumed the closed outcome stream.

use crate::constants::{ACCEPTED_BODY_STATUSES, ACCEPTED_TRANSPORT_STATUSES, API_KEY_HEADER};
use crate::disposition_log::{Disposition, DispositionEntry, DispositionLog};
use crate::error::{ProcessorError, Result};
use crate::fetch::build_client;
use crate::ids::generate_id;
use crate::metrics::SubmissionMetrics;
use crate::pipeline::aggregate::{Aggregator, Progress, Tally};
use crate::pipeline::dedup::UniqueRecords;
use crate::types::{Job, Record};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};

/// Pool size for `unique` records: grows by one per `max_workers` records,
/// capped at `max_workers`.
pub fn worker_count(unique: usize, max_workers: usize) -> usize {
    let max = max_workers.max(1);
    (unique / max + 1).min(max)
}

/// Turns a record into its wire payload.
pub trait RecordEncoder: Send + Sync {
    fn encode(&self, record: &Record) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "PaymentRecord")]
    payment_record: &'a Record,
}

/// `{"PaymentRecord": {...}}` JSON encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEnvelopeEncoder;

impl RecordEncoder for JsonEnvelopeEncoder {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&Envelope { payment_record: record })?)
    }
}

/// How a response from the submission API was judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    AcceptedByStatus(u16),
    AcceptedByBody(i64),
    RejectedByBody { status: i64, error: String },
    Undecodable { http_status: u16 },
}

impl ResponseClass {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::AcceptedByStatus(_) | Self::AcceptedByBody(_))
    }
}

/// Classify a response by its transport status first, then its JSON body.
pub fn classify_response(http_status: u16, body: &[u8]) -> ResponseClass {
    if ACCEPTED_TRANSPORT_STATUSES.contains(&http_status) {
        return ResponseClass::AcceptedByStatus(http_status);
    }

    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => return ResponseClass::Undecodable { http_status },
    };
    let status = value.get("status").and_then(|s| {
        s.as_i64()
            .or_else(|| s.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    });

    match status {
        Some(status) if ACCEPTED_BODY_STATUSES.contains(&status) => {
            ResponseClass::AcceptedByBody(status)
        }
        Some(status) => ResponseClass::RejectedByBody {
            status,
            error: value
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or_default()
                .to_string(),
        },
        None => ResponseClass::Undecodable { http_status },
    }
}

/// Delivers one job and reports whether the remote side accepted it.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, job: &Job) -> bool;
}

/// POSTs jobs to the payment records API, one attempt per job.
pub struct HttpSubmitter {
    client: reqwest::Client,
    url: String,
    api_key: String,
    log: Arc<dyn DispositionLog>,
}

impl HttpSubmitter {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        api_key: impl Into<String>,
        log: Arc<dyn DispositionLog>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            log,
        }
    }

    /// Build with a dedicated client bounded by `timeout`.
    pub fn with_timeout(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        log: Arc<dyn DispositionLog>,
    ) -> Result<Self> {
        Ok(Self::new(build_client(timeout)?, url, api_key, log))
    }

    fn record(&self, disposition: Disposition, cid: &str, job: &Job) {
        if let Err(e) = self
            .log
            .append(&DispositionEntry::submission(disposition, cid, job))
        {
            warn!(cid = %cid, "failed to write disposition log: {}", e);
        }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, job: &Job) -> bool {
        let cid = generate_id();
        let started = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(job.payload.clone())
            .send()
            .await;
        SubmissionMetrics::record_request_duration(started.elapsed().as_secs_f64());

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                error!(cid = %cid, "failure to submit record: {}", e);
                self.record(Disposition::Failure, &cid, job);
                return false;
            }
        };

        let http_status = response.status().as_u16();
        let class = if ACCEPTED_TRANSPORT_STATUSES.contains(&http_status) {
            ResponseClass::AcceptedByStatus(http_status)
        } else {
            match response.bytes().await {
                Ok(body) => classify_response(http_status, &body),
                Err(e) => {
                    warn!(cid = %cid, "failed to read response body: {}", e);
                    ResponseClass::Undecodable { http_status }
                }
            }
        };

        match &class {
            ResponseClass::AcceptedByStatus(_) | ResponseClass::AcceptedByBody(_) => {
                info!(cid = %cid, "success to submit record");
                self.record(Disposition::Success, &cid, job);
            }
            ResponseClass::RejectedByBody { status, error } => {
                error!(cid = %cid, status, "failure to create record: {}", error);
                self.record(Disposition::Failure, &cid, job);
            }
            ResponseClass::Undecodable { http_status } => {
                error!(
                    cid = %cid,
                    http_status,
                    "failure to create record: unreadable response body"
                );
                self.record(Disposition::Failure, &cid, job);
            }
        }

        class.is_accepted()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Dispatching,
    Draining,
    Done,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// What one engine run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineReport {
    pub workers: usize,
    pub dispatched: usize,
    /// Records never queued because their payload failed to encode.
    pub skipped: usize,
    pub tally: Tally,
}

#[derive(Debug, Default)]
struct DispatchStats {
    dispatched: usize,
    skipped: usize,
}

pub struct SubmissionEngine {
    submitter: Arc<dyn Submitter>,
    encoder: Arc<dyn RecordEncoder>,
    log: Arc<dyn DispositionLog>,
    max_workers: usize,
}

impl SubmissionEngine {
    pub fn new(
        submitter: Arc<dyn Submitter>,
        log: Arc<dyn DispositionLog>,
        max_workers: usize,
    ) -> Self {
        Self {
            submitter,
            encoder: Arc::new(JsonEnvelopeEncoder),
            log,
            max_workers,
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn RecordEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Submit every record once and return the aggregated outcome.
    ///
    /// The record set is moved into the producer and released as jobs are built.
    #[instrument(skip_all, fields(unique = records.len()))]
    pub async fn run(
        &self,
        records: UniqueRecords,
        progress: Box<dyn Progress>,
    ) -> Result<EngineReport> {
        let mut state = EngineState::Idle;
        let unique = records.len();
        let workers = worker_count(unique, self.max_workers);
        SubmissionMetrics::record_workers(workers);

        let (job_tx, job_rx) = mpsc::channel::<Job>(workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (outcome_tx, outcome_rx) = mpsc::channel::<bool>(workers);

        let (done, aggregator) = Aggregator::new(unique, progress).spawn(outcome_rx);

        state = transition(state, EngineState::Dispatching);
        let producer = tokio::spawn(produce(
            records,
            Arc::clone(&self.encoder),
            Arc::clone(&self.log),
            job_tx,
        ));
        info!(workers, unique, "submission workers started");

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                tokio::spawn(work(
                    id,
                    Arc::clone(&job_rx),
                    outcome_tx.clone(),
                    Arc::clone(&self.submitter),
                ))
            })
            .collect();

        // Barrier: every worker has exhausted the job queue.
        for handle in handles {
            handle.await?;
        }
        let stats = producer.await?;

        state = transition(state, EngineState::Draining);
        drop(outcome_tx);

        // Counts are only final once the aggregator confirms the drain.
        let tally = done.await.map_err(|_| ProcessorError::AggregatorLost)?;
        aggregator.await?;
        transition(state, EngineState::Done);

        Ok(EngineReport {
            workers,
            dispatched: stats.dispatched,
            skipped: stats.skipped,
            tally,
        })
    }
}

fn transition(from: EngineState, to: EngineState) -> EngineState {
    debug!(from = %from, to = %to, "engine state");
    to
}

async fn produce(
    records: UniqueRecords,
    encoder: Arc<dyn RecordEncoder>,
    log: Arc<dyn DispositionLog>,
    jobs: mpsc::Sender<Job>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    for record in records {
        match encoder.encode(&record) {
            Ok(payload) => {
                let job = Job {
                    payload,
                    digest: record.digest(),
                };
                if jobs.send(job).await.is_err() {
                    warn!("job queue closed before all records were dispatched");
                    break;
                }
                stats.dispatched += 1;
                SubmissionMetrics::record_job_dispatched();
            }
            Err(e) => {
                let sid = generate_id();
                error!(sid = %sid, "failure to allocate job: {}", e);
                let entry = DispositionEntry::serialization_failure(&sid, &record);
                if let Err(e) = log.append(&entry) {
                    warn!(sid = %sid, "failed to write disposition log: {}", e);
                }
                stats.skipped += 1;
                SubmissionMetrics::record_encode_failure();
            }
        }
    }

    debug!(dispatched = stats.dispatched, skipped = stats.skipped, "producer finished");
    stats
}

async fn work(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    outcomes: mpsc::Sender<bool>,
    submitter: Arc<dyn Submitter>,
) {
    let mut handled = 0usize;
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else { break };

        let accepted = submitter.submit(&job).await;
        handled += 1;
        if outcomes.send(accepted).await.is_err() {
            warn!(worker = id, "outcome channel closed early");
            break;
        }
    }
    debug!(worker = id, handled, "worker finished");
}
