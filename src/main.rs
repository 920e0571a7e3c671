use anyhow::Context;
use clap::Parser;
use eprocessor::config::{Config, Overrides};
use eprocessor::constants::DISPOSITION_LOG_FILE;
use eprocessor::disposition_log::{DispositionLog, FileDispositionLog};
use eprocessor::pipeline::{
    process_file, ConsoleProgress, FieldNormalizer, HttpSubmitter, SubmissionEngine,
};
use eprocessor::{fetch, logging, metrics};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "eprocessor")]
#[command(about = "Normalize, deduplicate and submit CSV payment records to a REST API")]
#[command(version)]
struct Cli {
    /// URL (including file name) of the data file to download
    #[arg(long)]
    source: Option<String>,
    /// API URL where the payment records are posted
    #[arg(long)]
    api: Option<String>,
    /// Value of the X-API-KEY header
    #[arg(long)]
    key: Option<String>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Process a local CSV file instead of downloading the source
    #[arg(long)]
    input: Option<PathBuf>,
    /// Directory in which the per-run log folder is created
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Upper bound on concurrent submission workers
    #[arg(long)]
    max_workers: Option<usize>,
}

fn banner() {
    let message = " E-COMPANY TOOL // CSV FILE PROCESSOR ";
    let frame = message.len() + 40;
    println!("\n{}", "/".repeat(frame));
    println!("{}{}{}", "@".repeat(20), message, "@".repeat(20));
    println!("{}\n", "/".repeat(frame));
}

async fn run(input: Option<PathBuf>, config: Config, run_dir: PathBuf) -> anyhow::Result<()> {
    let (path, import_date) = match input {
        Some(path) => {
            println!("\t[+] using local data file {}", path.display());
            (path, fetch::import_date_today())
        }
        None => {
            println!("\t[+] downloading the data file from {} ...", config.source.url);
            let client = fetch::build_client(config.timeout())?;
            let downloaded = fetch::download(&client, &config.source.url, &run_dir)
                .await
                .context("failed to download the data file")?;
            (downloaded.path, downloaded.import_date)
        }
    };

    let log: Arc<dyn DispositionLog> = Arc::new(
        FileDispositionLog::open(&run_dir.join(DISPOSITION_LOG_FILE))
            .context("failed to open the statistics log")?,
    );
    let submitter = Arc::new(HttpSubmitter::with_timeout(
        config.api.url.clone(),
        config.api.key.clone(),
        config.timeout(),
        Arc::clone(&log),
    )?);
    let engine = SubmissionEngine::new(submitter, log, config.submission.max_workers);
    let normalizer = FieldNormalizer::new(import_date);

    println!("\t[+] processing and submitting records ... [ STARTED ]\n");
    let summary = process_file(&path, &normalizer, &engine, Box::new(ConsoleProgress))
        .await
        .with_context(|| format!("failed to process {}", path.display()))?;

    println!("\n\t[+] {}", summary);
    if summary.skipped > 0 {
        warn!(skipped = summary.skipped, "some records could not be serialized and were not sent");
    }
    println!("\t[+] run logs saved under {}\n", run_dir.display());
    Ok(())
}

/// Exit status after Ctrl-C (128 + SIGINT).
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let overrides = Overrides {
        source_url: cli.source,
        api_url: cli.api,
        api_key: cli.key,
        max_workers: cli.max_workers,
        output_dir: cli.output_dir,
    };
    let config = Config::load(cli.config.as_deref(), &overrides).context("invalid configuration")?;

    banner();

    let run_dir = logging::create_run_dir(&config.output.base_dir)
        .context("failed to create the run log folder")?;
    let _guard = logging::init_logging(&run_dir);
    metrics::init_metrics();

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", run_id = %run_id);
    info!(run_id = %run_id, run_dir = %run_dir.display(), "eprocessor started");

    // Returning from both arms drops `_guard`, which flushes details.log.
    tokio::select! {
        result = run(cli.input, config, run_dir).instrument(span) => {
            if let Err(e) = &result {
                error!("program execution aborted: {:#}", e);
            }
            result.map(|()| ExitCode::SUCCESS)
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, leaving without waiting for in-flight submissions");
            println!();
            Ok(ExitCode::from(INTERRUPTED))
        }
    }
}
