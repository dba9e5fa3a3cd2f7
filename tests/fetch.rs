mod common;

use std::fs;

use assert_matches::assert_matches;

use nfl_ingest::error::IngestError;
use nfl_ingest::fetch::ArchiveFetcher;
use nfl_ingest::kaggle::{ArchiveSource, KaggleCli};

use common::{FailingSource, MockSource, RecordingSink, competition_files, dataset, utf8};

#[test]
fn second_fetch_skips_download() {
    let temp = tempfile::tempdir().unwrap();
    let dest = utf8(temp.path()).join("zipped_data");
    let fetcher = ArchiveFetcher::new(MockSource::with_files(competition_files()));
    let sink = RecordingSink::default();

    let first = fetcher.fetch(&dataset(), &dest, false, &sink).unwrap();
    let second = fetcher.fetch(&dataset(), &dest, false, &sink).unwrap();

    assert_eq!(first, dest);
    assert_eq!(second, dest);
    assert_eq!(fetcher.source().calls(), 1);
    assert!(dest.join("nfl-big-data-bowl-2026-prediction.zip").as_std_path().is_file());
    assert!(sink.messages().last().unwrap().contains("archive present"));
}

#[test]
fn force_downloads_again() {
    let temp = tempfile::tempdir().unwrap();
    let dest = utf8(temp.path());
    let fetcher = ArchiveFetcher::new(MockSource::with_files(competition_files()));
    let sink = RecordingSink::default();

    fetcher.fetch(&dataset(), &dest, false, &sink).unwrap();
    fetcher.fetch(&dataset(), &dest, true, &sink).unwrap();

    assert_eq!(fetcher.source().calls(), 2);
}

#[test]
fn failed_download_leaves_no_archive() {
    let temp = tempfile::tempdir().unwrap();
    let dest = utf8(temp.path()).join("zipped_data");
    let fetcher = ArchiveFetcher::new(FailingSource);

    let err = fetcher
        .fetch(&dataset(), &dest, false, &RecordingSink::default())
        .unwrap_err();

    assert_matches!(err, IngestError::Download { ref message, .. } if message.contains("403"));
    let leftovers = fs::read_dir(dest.as_std_path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

struct SilentSource;

impl ArchiveSource for SilentSource {
    fn download(
        &self,
        _dataset: &nfl_ingest::domain::DatasetId,
        _destination_dir: &std::path::Path,
    ) -> Result<(), IngestError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

#[test]
fn source_without_archive_is_a_download_error() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = ArchiveFetcher::new(SilentSource);

    let err = fetcher
        .fetch(&dataset(), &utf8(temp.path()), false, &RecordingSink::default())
        .unwrap_err();

    assert_matches!(err, IngestError::Download { .. });
}

#[test]
fn missing_cli_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let cli = KaggleCli::with_program(temp.path().join("does-not-exist"));

    let err = cli.download(&dataset(), temp.path()).unwrap_err();

    assert_matches!(err, IngestError::Download { ref message, .. } if message.contains("spawn"));
}

#[cfg(unix)]
#[test]
fn cli_nonzero_exit_carries_stderr() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let script = temp.path().join("kaggle");
    fs::write(&script, "#!/bin/sh\necho '403 - Forbidden' >&2\nexit 1\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let fetcher = ArchiveFetcher::new(KaggleCli::with_program(script));

    let err = fetcher
        .fetch(&dataset(), &utf8(temp.path()).join("zipped"), false, &RecordingSink::default())
        .unwrap_err();

    assert_matches!(err, IngestError::Download { ref message, .. } if message == "403 - Forbidden");
}
