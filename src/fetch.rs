use crate::constants::IMPORT_DATE_FORMAT;
use crate::error::{ProcessorError, Result};
use chrono::Utc;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// A source table saved to disk, with the as-of date of the download.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub path: PathBuf,
    pub import_date: String,
}

/// Last path segment of `url`, which must be non-empty.
pub fn extract_filename(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| ProcessorError::InvalidSourceUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let filename = parsed
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    if filename.is_empty() {
        return Err(ProcessorError::InvalidSourceUrl {
            url: url.to_string(),
            reason: "the link does not point to a file".to_string(),
        });
    }
    Ok(filename)
}

/// HTTP client with connect and request time both bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()?)
}

/// Today's as-of date in UTC, `MM/DD/YYYY`.
pub fn import_date_today() -> String {
    Utc::now().format(IMPORT_DATE_FORMAT).to_string()
}

/// Stream the file at `url` into `dir`, keeping its remote file name.
#[instrument(skip(client, dir))]
pub async fn download(client: &reqwest::Client, url: &str, dir: &Path) -> Result<Downloaded> {
    let filename = extract_filename(url)?;

    let mut response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProcessorError::DownloadStatus(status.as_u16()));
    }

    let path = dir.join(&filename);
    let mut file = tokio::fs::File::create(&path).await?;
    let mut written = 0usize;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;

    info!(file = %filename, bytes = written, "saved source file");
    Ok(Downloaded {
        path,
        import_date: import_date_today(),
    })
}
