use anyhow::Result;
use eprocessor::disposition_log::{
    read_entries, Disposition, DispositionLog, FileDispositionLog, IdKind,
};
use eprocessor::pipeline::{
    process_file, ConsoleProgress, FieldNormalizer, HttpSubmitter, RunSummary, SubmissionEngine,
};
use eprocessor::types::PaymentRecord;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, NamedTempFile};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEADER: &str =
    "Date,Name,Address,Address2,City,State,Zipcode,Telephone,Mobile,Amount,Memo,Processor";

/// 10 rows: one triplicate, three duplicate pairs and a single, once the
/// Memo column is gone. Blank fields become "missing".
const ROWS: [&str; 10] = [
    "01/04/2016,Jerome AMON,Poland Street,,Warsaw,PL,38002,,000-000-0000,$90,first,Stripe",
    "01/04/2016,Jerome AMON,Poland Street,,Warsaw,PL,38002, ,000-000-0000,$90,second,Stripe",
    "01/04/2016,Jerome AMON,Poland Street,missing,Warsaw,PL,38002,,000-000-0000,$90,,Stripe",
    "01/04/2017,Jerome AMON,Poland Street,,Warsaw,PL,38002,,000-000-0000,$90,,Stripe",
    "01/04/2017,Jerome AMON,Poland Street,,Warsaw,PL,38002,,000-000-0000,$90,x,Stripe",
    "01/04/2018,Abou AMON,Poland Street,,Warsaw,PL,38002,,000-000-0000,$90,,Stripe",
    "01/04/2018,Abou AMON,Poland Street,,Warsaw,PL,38002,,000-000-0000,$90,,Stripe",
    "01/04/2019,Abou AMON,Poland Street,,Krakow,PL,38002,,000-000-0000,$90,,Stripe",
    "01/04/2019,Abou AMON,Poland Street,,Krakow,PL,38002,,000-000-0000,$90,,Stripe",
    "01/04/2016,Abou AMON,Poland Street,,Warsaw,PL,38002,,000-000-0000,$90,,Stripe",
];

fn write_table() -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{}", HEADER)?;
    for row in ROWS {
        writeln!(file, "{}", row)?;
    }
    Ok(file)
}

async fn run_against(server: &MockServer, log_path: &Path) -> Result<RunSummary> {
    let table = write_table()?;
    let log: Arc<dyn DispositionLog> = Arc::new(FileDispositionLog::open(log_path)?);
    let submitter = Arc::new(HttpSubmitter::new(
        reqwest::Client::new(),
        format!("{}/records", server.uri()),
        "my-key",
        Arc::clone(&log),
    ));
    let engine = SubmissionEngine::new(submitter, log, 10);
    let normalizer = FieldNormalizer::new("08/04/2021");

    Ok(process_file(table.path(), &normalizer, &engine, Box::new(ConsoleProgress)).await?)
}

#[tokio::test]
async fn test_created_responses_count_as_success() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records"))
        .and(header("X-API-KEY", "my-key"))
        .respond_with(ResponseTemplate::new(201))
        .expect(5)
        .mount(&server)
        .await;

    let dir = tempdir()?;
    let log_path = dir.path().join("statistics.log");
    let summary = run_against(&server, &log_path).await?;

    assert_eq!(summary.initial, 10);
    assert_eq!(summary.unique, 5);
    assert_eq!(summary.sent, 5);
    assert_eq!(summary.success, 5);
    assert_eq!(summary.failure, 0);
    assert_eq!(summary.success_rate(), Some(100.0));
    assert!(summary.to_string().ends_with("success rate: 100.00%"));

    let entries = read_entries(&log_path)?;
    assert_eq!(entries.len(), 5);
    assert!(entries
        .iter()
        .all(|e| e.disposition == Disposition::Success && e.id_kind == IdKind::Cid));
    Ok(())
}

#[tokio::test]
async fn test_submitted_payloads_are_normalized_records() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempdir()?;
    run_against(&server, &dir.path().join("statistics.log")).await?;

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 5);
    for request in requests {
        let envelope: PaymentRecord = serde_json::from_slice(&request.body)?;
        let record = envelope.payment_record;
        assert_eq!(record.import_date, "08/04/2021");
        assert_eq!(record.address2, "missing");
        assert_eq!(record.telephone, "missing");
        assert_eq!(record.processor, "Stripe");
    }
    Ok(())
}

#[tokio::test]
async fn test_body_status_decides_outcome() -> Result<()> {
    let accepting = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"status": 202, "error": ""})))
        .mount(&accepting)
        .await;

    let dir = tempdir()?;
    let summary = run_against(&accepting, &dir.path().join("accepted.log")).await?;
    assert_eq!((summary.success, summary.failure), (5, 0));

    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({
                "status": 422,
                "error": "data submitted is not expected format."
            })),
        )
        .mount(&rejecting)
        .await;

    let summary = run_against(&rejecting, &dir.path().join("rejected.log")).await?;
    assert_eq!((summary.success, summary.failure), (0, 5));
    assert_eq!(summary.success_rate(), Some(0.0));
    assert!(summary.success + summary.failure <= summary.unique);
    Ok(())
}
