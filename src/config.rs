use std::collections::HashSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{DatasetId, KeyPolicy, RunTimestamp, SourceKind};
use crate::error::IngestError;

pub const DEFAULT_CONFIG_FILE: &str = "nfl-ingest.json";
pub const PIPELINE_NAME: &str = "nfl_game_competition";
pub const ARTIFACT_DIR: &str = "artifacts";
pub const DEFAULT_DATASET_ID: &str = "nfl-big-data-bowl-2026-prediction";
pub const DEFAULT_SCHEMA_PATH: &str = "data_schema/schema.yaml";
pub const DEFAULT_TEST_FRACTION: f64 = 0.10;
pub const DEFAULT_SEED: u64 = 42;

const MODEL_DIR_NAME: &str = "final_model";
const DATA_INGESTION_DIR_NAME: &str = "data_ingestion";
const FEATURE_STORE_DIR: &str = "feature_store";
const INGESTED_DIR: &str = "ingested";
const ZIPPED_DIR: &str = "zipped_data";
const UNZIPPED_DIR: &str = "unzipped_data";
const SPLIT_DIR: &str = "train_test_split";
const MERGED_FILE_NAME: &str = "merged_data.csv";
const TRAIN_FILE_NAME: &str = "train.csv";
const TEST_FILE_NAME: &str = "test.csv";

/// On-disk shape of `nfl-ingest.json`. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub artifact_dir: Option<String>,
    #[serde(default)]
    pub schema_path: Option<String>,
    #[serde(default)]
    pub test_fraction: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub key_columns: Option<Vec<String>>,
    #[serde(default)]
    pub target_columns: Option<Vec<String>>,
    #[serde(default)]
    pub duplicate_keys: Option<KeyPolicy>,
    #[serde(default)]
    pub source: Option<SourceKind>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub dataset_id: DatasetId,
    pub artifact_dir: Utf8PathBuf,
    pub schema_path: Utf8PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub key_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub duplicate_keys: KeyPolicy,
    pub source: SourceKind,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads an explicit config file, or `nfl-ingest.json` from the working
    /// directory when it exists. Without either, defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IngestError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| IngestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| IngestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IngestError> {
        let dataset_id = config
            .dataset_id
            .as_deref()
            .unwrap_or(DEFAULT_DATASET_ID)
            .parse()?;

        let test_fraction = config.test_fraction.unwrap_or(DEFAULT_TEST_FRACTION);
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(IngestError::Config(format!(
                "test_fraction must be in (0, 1), got {test_fraction}"
            )));
        }

        let key_columns = config.key_columns.unwrap_or_else(default_key_columns);
        let target_columns = config.target_columns.unwrap_or_else(default_target_columns);
        validate_columns(&key_columns, &target_columns)?;

        Ok(ResolvedConfig {
            dataset_id,
            artifact_dir: Utf8PathBuf::from(config.artifact_dir.as_deref().unwrap_or(ARTIFACT_DIR)),
            schema_path: Utf8PathBuf::from(
                config.schema_path.as_deref().unwrap_or(DEFAULT_SCHEMA_PATH),
            ),
            test_fraction,
            seed: config.seed.unwrap_or(DEFAULT_SEED),
            key_columns,
            target_columns,
            duplicate_keys: config.duplicate_keys.unwrap_or_default(),
            source: config.source.unwrap_or_default(),
        })
    }
}

pub fn default_key_columns() -> Vec<String> {
    vec![
        "game_id".to_string(),
        "play_id".to_string(),
        "nfl_id".to_string(),
        "frame_id".to_string(),
    ]
}

pub fn default_target_columns() -> Vec<String> {
    vec!["x".to_string(), "y".to_string()]
}

/// Name given to an output coordinate column once it is marked as a target.
pub fn target_name(column: &str) -> String {
    format!("target_{column}")
}

fn validate_columns(keys: &[String], targets: &[String]) -> Result<(), IngestError> {
    check_names("key_columns", keys)?;
    check_names("target_columns", targets)?;
    if let Some(overlap) = targets.iter().find(|target| keys.contains(target)) {
        return Err(IngestError::Config(format!(
            "column {overlap} cannot be both a key and a target"
        )));
    }
    Ok(())
}

fn check_names(field: &str, names: &[String]) -> Result<(), IngestError> {
    if names.is_empty() {
        return Err(IngestError::Config(format!("{field} must not be empty")));
    }
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if name.trim().is_empty() {
            return Err(IngestError::Config(format!("{field} contains a blank name")));
        }
        if !seen.insert(name.as_str()) {
            return Err(IngestError::Config(format!("{field} lists {name} twice")));
        }
    }
    Ok(())
}

/// Every path one ingestion run reads or writes. A pure function of the run
/// timestamp and the resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionConfig {
    pub pipeline_name: String,
    pub timestamp: RunTimestamp,
    pub artifact_root: Utf8PathBuf,
    pub model_dir: Utf8PathBuf,
    pub data_ingestion_dir: Utf8PathBuf,
    pub dataset_id: DatasetId,
    pub zipped_data_dir: Utf8PathBuf,
    pub unzipped_data_dir: Utf8PathBuf,
    pub feature_store_path: Utf8PathBuf,
    pub train_path: Utf8PathBuf,
    pub test_path: Utf8PathBuf,
    pub schema_path: Utf8PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub key_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub duplicate_keys: KeyPolicy,
}

impl IngestionConfig {
    pub fn new(settings: &ResolvedConfig, timestamp: RunTimestamp) -> Self {
        let artifact_root = settings.artifact_dir.join(timestamp.as_str());
        let data_ingestion_dir = artifact_root.join(DATA_INGESTION_DIR_NAME);
        let ingested = data_ingestion_dir.join(INGESTED_DIR);
        let split_dir = ingested.join(SPLIT_DIR);

        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            model_dir: artifact_root.join(MODEL_DIR_NAME),
            dataset_id: settings.dataset_id.clone(),
            zipped_data_dir: ingested.join(ZIPPED_DIR),
            unzipped_data_dir: ingested.join(UNZIPPED_DIR),
            feature_store_path: data_ingestion_dir
                .join(FEATURE_STORE_DIR)
                .join(MERGED_FILE_NAME),
            train_path: split_dir.join(TRAIN_FILE_NAME),
            test_path: split_dir.join(TEST_FILE_NAME),
            schema_path: settings.schema_path.clone(),
            test_fraction: settings.test_fraction,
            seed: settings.seed,
            key_columns: settings.key_columns.clone(),
            target_columns: settings.target_columns.clone(),
            duplicate_keys: settings.duplicate_keys,
            data_ingestion_dir,
            artifact_root,
            timestamp,
        }
    }

    pub fn archive_path(&self) -> Utf8PathBuf {
        archive_path(&self.zipped_data_dir, &self.dataset_id)
    }
}

pub fn archive_path(archive_dir: &Utf8Path, dataset_id: &DatasetId) -> Utf8PathBuf {
    archive_dir.join(dataset_id.archive_name())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_resolve() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.dataset_id.as_str(), DEFAULT_DATASET_ID);
        assert_eq!(resolved.test_fraction, 0.10);
        assert_eq!(resolved.seed, 42);
        assert_eq!(resolved.key_columns, default_key_columns());
        assert_eq!(resolved.duplicate_keys, KeyPolicy::Reject);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        for fraction in [0.0, 1.0, -0.5, f64::NAN] {
            let config = Config {
                test_fraction: Some(fraction),
                ..Config::default()
            };
            let err = ConfigLoader::resolve_config(config).unwrap_err();
            assert_matches!(err, IngestError::Config(_));
        }
    }

    #[test]
    fn rejects_target_that_is_a_key() {
        let config = Config {
            target_columns: Some(vec!["frame_id".to_string()]),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, IngestError::Config(_));
    }

    #[test]
    fn rejects_empty_target_list() {
        let config = Config {
            target_columns: Some(Vec::new()),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, IngestError::Config(_));
    }

    #[test]
    fn rejects_repeated_column_names() {
        let keys = Config {
            key_columns: Some(vec!["game_id".to_string(), "game_id".to_string()]),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(keys),
            Err(IngestError::Config(message)) if message.contains("key_columns")
        );

        let targets = Config {
            target_columns: Some(vec!["x".to_string(), "y".to_string(), "x".to_string()]),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(targets),
            Err(IngestError::Config(message)) if message.contains("target_columns")
        );
    }
}
