use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use directories::BaseDirs;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::DatasetId;
use crate::error::IngestError;

/// Something that can deposit `{dataset}.zip` into a directory.
pub trait ArchiveSource: Send + Sync {
    fn download(&self, dataset: &DatasetId, destination_dir: &Path) -> Result<(), IngestError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl KaggleCredentials {
    /// `KAGGLE_USERNAME`/`KAGGLE_KEY` first, then `kaggle.json` from
    /// `KAGGLE_CONFIG_DIR` or `~/.kaggle`.
    pub fn load() -> Result<Self, IngestError> {
        if let (Ok(username), Ok(key)) = (
            std::env::var("KAGGLE_USERNAME"),
            std::env::var("KAGGLE_KEY"),
        ) {
            if !username.trim().is_empty() && !key.trim().is_empty() {
                return Ok(Self {
                    username: username.trim().to_string(),
                    key: key.trim().to_string(),
                });
            }
        }

        let config_dir = std::env::var_os("KAGGLE_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().join(".kaggle")))
            .ok_or_else(|| {
                IngestError::MissingCredentials("unable to resolve home directory".to_string())
            })?;
        Self::from_file(&config_dir.join("kaggle.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, IngestError> {
        let content = fs::read_to_string(path).map_err(|err| {
            IngestError::MissingCredentials(format!("read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|err| {
            IngestError::MissingCredentials(format!("parse {}: {err}", path.display()))
        })
    }
}

/// Authenticated client for the Kaggle REST API.
#[derive(Clone)]
pub struct KaggleHttpClient {
    client: Client,
    credentials: KaggleCredentials,
    base_url: String,
}

impl KaggleHttpClient {
    pub fn new() -> Result<Self, IngestError> {
        Self::with_credentials(KaggleCredentials::load()?)
    }

    pub fn with_credentials(credentials: KaggleCredentials) -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("nfl-ingest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IngestError::Config(err.to_string()))?,
        );

        // Competition archives run to several hundred megabytes.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(60 * 60))
            .build()
            .map_err(|err| IngestError::Config(err.to_string()))?;

        Ok(Self {
            client,
            credentials,
            base_url: "https://www.kaggle.com/api/v1".to_string(),
        })
    }

    pub fn download_url(&self, dataset: &DatasetId) -> String {
        format!(
            "{}/competitions/data/download-all/{}",
            self.base_url,
            dataset.as_str()
        )
    }
}

impl ArchiveSource for KaggleHttpClient {
    fn download(&self, dataset: &DatasetId, destination_dir: &Path) -> Result<(), IngestError> {
        let fail = |message: String| IngestError::Download {
            dataset: dataset.to_string(),
            message,
        };
        let url = self.download_url(dataset);
        debug!(%url, "requesting competition archive");

        let mut response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.key))
            .send()
            .map_err(|err| fail(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Kaggle request failed".to_string());
            return Err(IngestError::DownloadStatus { status, message });
        }

        let destination = destination_dir.join(dataset.archive_name());
        let mut file = File::create(&destination).map_err(|err| {
            IngestError::Filesystem(format!("create {}: {err}", destination.display()))
        })?;
        let bytes = std::io::copy(&mut response, &mut file).map_err(|err| fail(err.to_string()))?;
        info!(bytes, "archive downloaded");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "kaggle-http"
    }
}

/// Shells out to the official `kaggle` command-line client.
#[derive(Debug, Clone)]
pub struct KaggleCli {
    program: Option<PathBuf>,
}

impl KaggleCli {
    pub fn new() -> Self {
        Self {
            program: find_in_path("kaggle"),
        }
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            program: Some(program),
        }
    }

    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    fn run_cmd(&self, dataset: &DatasetId, args: &[String]) -> Result<(), IngestError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| IngestError::MissingTool("kaggle".to_string()))?;
        debug!(program = %program.display(), ?args, "running download command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| IngestError::Download {
                dataset: dataset.to_string(),
                message: format!("spawn {}: {err}", program.display()),
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {} ({})", program.display(), output.status)
        } else {
            stderr
        };
        Err(IngestError::Download {
            dataset: dataset.to_string(),
            message,
        })
    }
}

impl Default for KaggleCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveSource for KaggleCli {
    fn download(&self, dataset: &DatasetId, destination_dir: &Path) -> Result<(), IngestError> {
        let args = vec![
            "competitions".to_string(),
            "download".to_string(),
            "-c".to_string(),
            dataset.as_str().to_string(),
            "-p".to_string(),
            destination_dir.to_string_lossy().to_string(),
        ];
        self.run_cmd(dataset, &args)?;
        if !destination_dir.join(dataset.archive_name()).exists() {
            return Err(IngestError::Download {
                dataset: dataset.to_string(),
                message: format!("kaggle did not produce {}", dataset.archive_name()),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "kaggle-cli"
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}
