use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

pub const TIMESTAMP_FORMAT: &str = "%d_%m_%Y_%H_%M_%S";

/// Kaggle competition slug, e.g. `nfl-big-data-bowl-2026-prediction`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.0)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized.len() <= 100
            && !normalized.starts_with('-')
            && !normalized.ends_with('-')
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
        if !is_valid {
            return Err(IngestError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Run identifier; also the name of the per-run artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    pub fn from_datetime(value: NaiveDateTime) -> Self {
        Self(value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunTimestamp {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
            .map_err(|_| IngestError::InvalidTimestamp(value.to_string()))?;
        Ok(Self::from_datetime(parsed))
    }
}

/// What to do when a compound key occurs more than once in a partition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyPolicy {
    #[default]
    Reject,
    FanOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Http,
    Cli,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Http => write!(f, "http"),
            SourceKind::Cli => write!(f, "cli"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_dataset_id_valid() {
        let id: DatasetId = " NFL-Big-Data-Bowl-2026-Prediction ".parse().unwrap();
        assert_eq!(id.as_str(), "nfl-big-data-bowl-2026-prediction");
        assert_eq!(id.archive_name(), "nfl-big-data-bowl-2026-prediction.zip");
    }

    #[test]
    fn parse_dataset_id_invalid() {
        for raw in ["", "-leading", "has space", "../escape", "slash/inside"] {
            let err = raw.parse::<DatasetId>().unwrap_err();
            assert_matches!(err, IngestError::InvalidDatasetId(_));
        }
    }

    #[test]
    fn timestamp_roundtrips_canonical_form() {
        let ts: RunTimestamp = "05_01_2026_09_03_07".parse().unwrap();
        assert_eq!(ts.as_str(), "05_01_2026_09_03_07");
    }

    #[test]
    fn timestamp_rejects_other_formats() {
        let err = "2026-01-05T09:03:07".parse::<RunTimestamp>().unwrap_err();
        assert_matches!(err, IngestError::InvalidTimestamp(_));
        let err = "32_01_2026_09_03_07".parse::<RunTimestamp>().unwrap_err();
        assert_matches!(err, IngestError::InvalidTimestamp(_));
    }
}
