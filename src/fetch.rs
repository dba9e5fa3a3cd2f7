use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, info_span};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::archive_path;
use crate::domain::DatasetId;
use crate::error::IngestError;
use crate::kaggle::ArchiveSource;
use crate::store;

pub struct ArchiveFetcher<S: ArchiveSource> {
    source: S,
}

impl<S: ArchiveSource> ArchiveFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Makes sure `{destination_dir}/{dataset}.zip` exists and returns
    /// `destination_dir`. The source is only contacted when the archive is
    /// missing or `force` is set.
    pub fn fetch(
        &self,
        dataset: &DatasetId,
        destination_dir: &Utf8Path,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Utf8PathBuf, IngestError> {
        let _span = info_span!("fetch", dataset = %dataset).entered();
        store::ensure_dir(destination_dir)?;

        let archive = archive_path(destination_dir, dataset);
        if !force && archive.as_std_path().exists() {
            info!(%archive, "archive already present, skipping download");
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; archive present at {archive}"),
                elapsed: None,
            });
            return Ok(destination_dir.to_path_buf());
        }

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; downloading {dataset} via {}", self.source.name()),
            elapsed: None,
        });
        let start = Instant::now();

        // The source writes into a scratch directory; only a finished archive
        // is renamed to the path the existence check looks at.
        let scratch = tempfile::Builder::new()
            .prefix(".nfl-ingest-download")
            .tempdir_in(destination_dir.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        self.source.download(dataset, scratch.path())?;

        let downloaded = scratch.path().join(dataset.archive_name());
        if !downloaded.is_file() {
            return Err(IngestError::Download {
                dataset: dataset.to_string(),
                message: format!(
                    "{} reported success but produced no {}",
                    self.source.name(),
                    dataset.archive_name()
                ),
            });
        }
        store::move_file_atomic(&downloaded, &archive)?;

        let elapsed = start.elapsed();
        info!(%archive, elapsed_ms = elapsed.as_millis() as u64, "archive downloaded");
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; saved {archive}"),
            elapsed: Some(elapsed),
        });
        Ok(destination_dir.to_path_buf())
    }
}
