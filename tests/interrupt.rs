#![cfg(unix)]

use anyhow::{bail, Result};
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const TABLE: &str = "\
Date,Name,Address,Address2,City,State,Zipcode,Telephone,Mobile,Amount,Memo,Processor
01/04/2016,Jerome AMON,Poland Street,,Warsaw,PL,38002,,000-000-0000,$90,,Stripe
01/04/2017,Abou AMON,Poland Street,,Krakow,PL,38002,,000-000-0000,$90,,Stripe
";

fn details_log(output_dir: &Path) -> Option<PathBuf> {
    fs::read_dir(output_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("details.log"))
        .find(|path| path.is_file())
}

fn wait_for<T>(timeout: Duration, mut check: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(value) = check() {
            return Some(value);
        }
        sleep(Duration::from_millis(50));
    }
    None
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    match wait_for(timeout, || child.try_wait().ok().flatten()) {
        Some(status) => Ok(status),
        None => {
            let _ = child.kill();
            bail!("eprocessor did not exit after SIGINT");
        }
    }
}

#[test]
fn test_ctrl_c_flushes_execution_log() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("data.csv");
    fs::write(&input, TABLE)?;
    let output_dir = dir.path().join("runs");

    // Accepts connections into the backlog but never answers them.
    let api = TcpListener::bind("127.0.0.1:0")?;
    let api_url = format!("http://{}/records", api.local_addr()?);

    let mut child = Command::new(env!("CARGO_BIN_EXE_eprocessor"))
        .current_dir(dir.path())
        .env("RUST_LOG", "eprocessor=info")
        .env_remove("EPROCESSOR_SOURCE_URL")
        .env_remove("EPROCESSOR_MAX_WORKERS")
        .env_remove("EPROCESSOR_TIMEOUT_SECS")
        .env_remove("EPROCESSOR_METRICS_ADDR")
        .arg("--input")
        .arg(&input)
        .args(["--api", &api_url, "--key", "k"])
        .arg("--output-dir")
        .arg(&output_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let started = wait_for(Duration::from_secs(20), || {
        let path = details_log(&output_dir)?;
        let content = fs::read_to_string(&path).ok()?;
        content.contains("submission workers started").then_some(path)
    });
    let Some(log_path) = started else {
        let _ = child.kill();
        bail!("submission never started");
    };
    // Leave time for the signal handler to be installed.
    sleep(Duration::from_millis(300));

    let signalled = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()?;
    assert!(signalled.success());

    let status = wait_for_exit(&mut child, Duration::from_secs(10))?;
    assert_eq!(status.code(), Some(130));

    let content = fs::read_to_string(&log_path)?;
    assert!(
        content.contains("interrupted, leaving without waiting for in-flight submissions"),
        "details.log is missing the interrupt warning:\n{content}"
    );
    drop(api);
    Ok(())
}
