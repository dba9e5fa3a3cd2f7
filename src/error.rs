use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(nfl_ingest::config))]
    Config(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid dataset identifier: {0}")]
    InvalidDatasetId(String),

    #[error("invalid run timestamp {0:?}, expected DD_MM_YYYY_HH_MM_SS")]
    InvalidTimestamp(String),

    #[error("download of {dataset} failed: {message}")]
    #[diagnostic(code(nfl_ingest::download))]
    Download { dataset: String, message: String },

    #[error("download service returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install the Kaggle CLI (`pip install kaggle`) or use --source http"))]
    MissingTool(String),

    #[error("missing Kaggle credentials: {0}")]
    #[diagnostic(help("set KAGGLE_USERNAME and KAGGLE_KEY or create ~/.kaggle/kaggle.json"))]
    MissingCredentials(String),

    #[error("failed to extract {path}: {message}")]
    #[diagnostic(code(nfl_ingest::extract))]
    Extraction { path: Utf8PathBuf, message: String },

    #[error("no directory containing \"train\" found under {0}")]
    #[diagnostic(code(nfl_ingest::discovery))]
    Discovery(Utf8PathBuf),

    #[error("found {inputs} input files but {outputs} output files in {dir}")]
    #[diagnostic(code(nfl_ingest::count_mismatch))]
    CountMismatch {
        dir: Utf8PathBuf,
        inputs: usize,
        outputs: usize,
    },

    #[error("partition {index} pairs {input} with {output}")]
    PartitionMismatch {
        index: usize,
        input: String,
        output: String,
    },

    #[error("key {key} appears more than once in {path}")]
    #[diagnostic(help("set \"duplicate_keys\": \"fan-out\" to keep the cartesian join"))]
    DuplicateKey { path: Utf8PathBuf, key: String },

    #[error("cannot join {path}: {message}")]
    Join { path: Utf8PathBuf, message: String },

    #[error("malformed table {path}: {message}")]
    Table { path: Utf8PathBuf, message: String },

    #[error("failed to write schema to {path}: {message}")]
    Schema { path: Utf8PathBuf, message: String },

    #[error("cannot split dataset: {0}")]
    #[diagnostic(code(nfl_ingest::split))]
    Split(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
