use crate::constants::{
    DEFAULT_MAX_WORKERS, DEFAULT_SOURCE_URL, DEFAULT_TIMEOUT_SECS, ENV_API_KEY, ENV_API_URL,
    ENV_MAX_WORKERS, ENV_SOURCE_URL, ENV_TIMEOUT_SECS,
};
use crate::error::{ProcessorError, Result};
use crate::fetch::extract_filename;
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source: SourceSettings,
    pub api: ApiSettings,
    pub submission: SubmissionSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubmissionSettings {
    pub max_workers: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory under which each run gets its own `log@...` folder.
    pub base_dir: PathBuf,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
        }
    }
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source_url: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub max_workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Parse a TOML config file; missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ProcessorError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Defaults, then the optional file, then the environment, then `overrides`.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply `EPROCESSOR_*` values looked up through `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_SOURCE_URL) {
            self.source.url = v;
        }
        if let Some(v) = get(ENV_API_URL) {
            self.api.url = v;
        }
        if let Some(v) = get(ENV_API_KEY) {
            self.api.key = v;
        }
        if let Some(v) = get(ENV_MAX_WORKERS) {
            self.submission.max_workers = v.trim().parse().map_err(|_| {
                ProcessorError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_MAX_WORKERS, v
                ))
            })?;
        }
        if let Some(v) = get(ENV_TIMEOUT_SECS) {
            self.submission.timeout_secs = v.trim().parse().map_err(|_| {
                ProcessorError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_TIMEOUT_SECS, v
                ))
            })?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(v) = &overrides.source_url {
            self.source.url = v.clone();
        }
        if let Some(v) = &overrides.api_url {
            self.api.url = v.clone();
        }
        if let Some(v) = &overrides.api_key {
            self.api.key = v.clone();
        }
        if let Some(v) = overrides.max_workers {
            self.submission.max_workers = v;
        }
        if let Some(v) = &overrides.output_dir {
            self.output.base_dir = v.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.url.trim().is_empty() {
            return Err(ProcessorError::Config(format!(
                "API URL is required: pass --api or set {}",
                ENV_API_URL
            )));
        }
        Url::parse(&self.api.url).map_err(|e| {
            ProcessorError::Config(format!("API URL '{}' is not a valid URL: {}", self.api.url, e))
        })?;
        if self.api.key.trim().is_empty() {
            return Err(ProcessorError::Config(format!(
                "API key is required: pass --key or set {}",
                ENV_API_KEY
            )));
        }
        extract_filename(&self.source.url)?;
        if self.submission.max_workers == 0 {
            return Err(ProcessorError::Config("max_workers must be at least 1".to_string()));
        }
        if self.submission.timeout_secs == 0 {
            return Err(ProcessorError::Config("timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.submission.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn complete() -> Config {
        let mut config = Config::default();
        config.api.url = "http://127.0.0.1:8080/records".into();
        config.api.key = "my-key".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.source.url, DEFAULT_SOURCE_URL);
        assert_eq!(config.submission.max_workers, 10);
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[api]\nurl = \"http://localhost/records\"\nkey = \"k\"\n\n\
             [submission]\nmax_workers = 4"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.api.url, "http://localhost/records");
        assert_eq!(config.submission.max_workers, 4);
        assert_eq!(config.submission.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.source.url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_env_then_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://env/records"),
            (ENV_API_KEY, "env-key"),
            (ENV_SOURCE_URL, ""),
            (ENV_MAX_WORKERS, "3"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api.key, "env-key");
        assert_eq!(config.source.url, DEFAULT_SOURCE_URL);
        assert_eq!(config.submission.max_workers, 3);

        config.apply_overrides(&Overrides {
            api_key: Some("cli-key".into()),
            ..Default::default()
        });
        assert_eq!(config.api.key, "cli-key");
        assert_eq!(config.api.url, "http://env/records");
    }

    #[test]
    fn test_bad_env_number_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));
    }

    #[test]
    fn test_validate() {
        assert!(complete().validate().is_ok());
        assert!(Config::default().validate().is_err());

        let mut config = complete();
        config.submission.max_workers = 0;
        assert!(config.validate().is_err());

        let mut config = complete();
        config.source.url = "https://host/folder/".into();
        assert!(matches!(config.validate(), Err(ProcessorError::InvalidSourceUrl { .. })));
    }

    #[test]
    fn test_unparseable_api_url_is_config_error() {
        for url in ["not a url", "/records", "http//example.com/records"] {
            let mut config = complete();
            config.api.url = url.into();
            assert!(
                matches!(config.validate(), Err(ProcessorError::Config(_))),
                "url: {url}"
            );
        }
    }
}
