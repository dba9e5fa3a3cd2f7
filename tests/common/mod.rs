#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use zip::write::SimpleFileOptions;

use nfl_ingest::app::{ProgressEvent, ProgressSink};
use nfl_ingest::config::{Config, ConfigLoader, IngestionConfig};
use nfl_ingest::domain::{DatasetId, RunTimestamp};
use nfl_ingest::error::IngestError;
use nfl_ingest::kaggle::ArchiveSource;

pub const DATASET: &str = "nfl-big-data-bowl-2026-prediction";

pub const INPUT_W01: &str = "\
game_id,play_id,nfl_id,frame_id,x,y,s
1,1,10,1,50.1,20.0,3.1
1,1,10,2,50.5,20.2,3.3
1,1,11,1,40.0,10.0,1.0
";

pub const OUTPUT_W01: &str = "\
game_id,play_id,nfl_id,frame_id,x,y
1,1,10,1,51.0,21.0
1,1,10,2,52.0,22.0
1,1,11,1,41.0,11.0
";

pub const INPUT_W02: &str = "\
game_id,play_id,nfl_id,frame_id,x,y,s
2,7,20,1,10.0,5.0,2.0
2,7,20,2,11.0,6.0,2.1
";

pub const OUTPUT_W02: &str = "\
game_id,play_id,nfl_id,frame_id,x,y
2,7,20,1,12.0,7.0
2,7,20,2,13.0,8.0
2,7,99,1,0.0,0.0
";

pub fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

pub fn dataset() -> DatasetId {
    DATASET.parse().unwrap()
}

/// Run config rooted in `root`, schema file included.
pub fn ingestion_config(root: &Utf8Path) -> IngestionConfig {
    let settings = ConfigLoader::resolve_config(Config {
        artifact_dir: Some(root.join("artifacts").to_string()),
        schema_path: Some(root.join("data_schema").join("schema.yaml").to_string()),
        ..Config::default()
    })
    .unwrap();
    let timestamp: RunTimestamp = "05_01_2026_09_03_07".parse().unwrap();
    IngestionConfig::new(&settings, timestamp)
}

pub fn competition_files() -> Vec<(String, String)> {
    vec![
        ("train/input_2023_w01.csv".to_string(), INPUT_W01.to_string()),
        ("train/output_2023_w01.csv".to_string(), OUTPUT_W01.to_string()),
        ("train/input_2023_w02.csv".to_string(), INPUT_W02.to_string()),
        ("train/output_2023_w02.csv".to_string(), OUTPUT_W02.to_string()),
        (
            "test_input.csv".to_string(),
            "game_id,play_id,nfl_id,frame_id\n3,1,1,1\n".to_string(),
        ),
    ]
}

pub fn write_zip(path: &Path, files: &[(String, String)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

pub fn write_file(path: &Utf8Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path()).unwrap();
    }
    fs::write(path.as_std_path(), content).unwrap();
}

/// Serves a fixed zip and counts how often it was asked to.
#[derive(Default)]
pub struct MockSource {
    pub calls: Mutex<usize>,
    pub files: Vec<(String, String)>,
}

impl MockSource {
    pub fn with_files(files: Vec<(String, String)>) -> Self {
        Self {
            calls: Mutex::new(0),
            files,
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl ArchiveSource for MockSource {
    fn download(&self, dataset: &DatasetId, destination_dir: &Path) -> Result<(), IngestError> {
        *self.calls.lock().unwrap() += 1;
        write_zip(&destination_dir.join(dataset.archive_name()), &self.files);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

impl ArchiveSource for &MockSource {
    fn download(&self, dataset: &DatasetId, destination_dir: &Path) -> Result<(), IngestError> {
        (**self).download(dataset, destination_dir)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct FailingSource;

impl ArchiveSource for FailingSource {
    fn download(&self, dataset: &DatasetId, _destination_dir: &Path) -> Result<(), IngestError> {
        Err(IngestError::Download {
            dataset: dataset.to_string(),
            message: "403 - rules not accepted".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}
