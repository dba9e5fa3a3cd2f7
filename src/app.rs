use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, info_span};

use crate::config::{IngestionConfig, ResolvedConfig};
use crate::domain::RunTimestamp;
use crate::error::IngestError;
use crate::extract::Extractor;
use crate::fetch::ArchiveFetcher;
use crate::kaggle::ArchiveSource;
use crate::reconcile::Reconciler;
use crate::split::Splitter;

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Redo download, extraction and merge even when their outputs exist.
    pub force: bool,
}

/// Paths produced by a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionArtifact {
    pub feature_store_file_path: Utf8PathBuf,
    pub train_file_path: Utf8PathBuf,
    pub test_file_path: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct DataIngestion<S: ArchiveSource> {
    config: IngestionConfig,
    fetcher: ArchiveFetcher<S>,
}

impl<S: ArchiveSource> DataIngestion<S> {
    pub fn new(config: IngestionConfig, source: S) -> Self {
        Self {
            config,
            fetcher: ArchiveFetcher::new(source),
        }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// fetch -> extract -> reconcile -> split. The first failing step aborts
    /// the run; files written by earlier steps stay for the next attempt.
    pub fn run(
        &self,
        options: &IngestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<IngestionArtifact, IngestError> {
        let config = &self.config;
        let _span = info_span!("ingestion", run = %config.timestamp).entered();
        info!(root = %config.artifact_root, dataset = %config.dataset_id, "data ingestion started");

        let archive_dir = self.fetcher.fetch(
            &config.dataset_id,
            &config.zipped_data_dir,
            options.force,
            sink,
        )?;
        let extract_dir = Extractor::new(config.dataset_id.clone()).extract(
            &archive_dir,
            &config.unzipped_data_dir,
            options.force,
            sink,
        )?;
        let merged = Reconciler::new(config).reconcile(&extract_dir, options.force, sink)?;
        Splitter::new(config).split_and_persist(&merged, sink)?;

        let artifact = IngestionArtifact {
            feature_store_file_path: config.feature_store_path.clone(),
            train_file_path: config.train_path.clone(),
            test_file_path: config.test_path.clone(),
        };
        info!(?artifact, "data ingestion completed");
        Ok(artifact)
    }
}

/// Drives the training pipeline stages. Only ingestion exists so far; the
/// later stages consume the returned artifact.
pub struct TrainingPipeline {
    settings: ResolvedConfig,
    timestamp: RunTimestamp,
}

impl TrainingPipeline {
    pub fn new(settings: ResolvedConfig, timestamp: RunTimestamp) -> Self {
        Self {
            settings,
            timestamp,
        }
    }

    pub fn ingestion_config(&self) -> IngestionConfig {
        IngestionConfig::new(&self.settings, self.timestamp.clone())
    }

    pub fn start_data_ingestion<S: ArchiveSource>(
        &self,
        source: S,
        options: &IngestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<IngestionArtifact, IngestError> {
        DataIngestion::new(self.ingestion_config(), source).run(options, sink)
    }

    pub fn run_pipeline<S: ArchiveSource>(
        &self,
        source: S,
        options: &IngestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<IngestionArtifact, IngestError> {
        self.start_data_ingestion(source, options, sink)
    }
}
