use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, info_span};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::archive_path;
use crate::domain::DatasetId;
use crate::error::IngestError;
use crate::fs_util;
use crate::store;

pub struct Extractor {
    dataset: DatasetId,
}

impl Extractor {
    pub fn new(dataset: DatasetId) -> Self {
        Self { dataset }
    }

    /// Unpacks `{archive_dir}/{dataset}.zip` into `extract_dir`. A non-empty
    /// `extract_dir` counts as already extracted unless `force` is set.
    pub fn extract(
        &self,
        archive_dir: &Utf8Path,
        extract_dir: &Utf8Path,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Utf8PathBuf, IngestError> {
        let _span = info_span!("extract", dataset = %self.dataset).entered();

        if !force && store::dir_has_entries(extract_dir)? {
            info!(%extract_dir, "extraction directory not empty, skipping unzip");
            sink.event(ProgressEvent {
                message: format!("phase=Extract; reusing {extract_dir}"),
                elapsed: None,
            });
            return Ok(extract_dir.to_path_buf());
        }

        let archive = archive_path(archive_dir, &self.dataset);
        if !archive.as_std_path().is_file() {
            return Err(IngestError::Extraction {
                path: archive,
                message: "archive not found".to_string(),
            });
        }

        sink.event(ProgressEvent {
            message: format!("phase=Extract; unpacking {archive}"),
            elapsed: None,
        });

        let parent = extract_dir
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        store::ensure_dir(parent)?;
        let scratch = tempfile::Builder::new()
            .prefix(".nfl-ingest-unzip")
            .tempdir_in(parent.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let files = fs_util::unpack_zip(&archive, scratch.path())?;
        store::atomic_rename_dir(scratch.path(), extract_dir)?;

        info!(%extract_dir, files, "archive extracted");
        Ok(extract_dir.to_path_buf())
    }
}
