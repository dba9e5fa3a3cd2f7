use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nfl_ingest::app::{IngestOptions, IngestionArtifact, ProgressSink, TrainingPipeline};
use nfl_ingest::config::ConfigLoader;
use nfl_ingest::domain::{KeyPolicy, RunTimestamp, SourceKind};
use nfl_ingest::error::IngestError;
use nfl_ingest::kaggle::{ArchiveSource, KaggleCli, KaggleHttpClient};
use nfl_ingest::output::{JsonOutput, OutputMode, StderrProgress};

#[derive(Parser)]
#[command(name = "nfl-ingest")]
#[command(about = "Fetch, extract, merge and split the NFL Big Data Bowl training data")]
#[command(version, author)]
struct Cli {
    /// JSON config file (defaults to ./nfl-ingest.json when present)
    #[arg(long)]
    config: Option<String>,

    /// Reuse the artifacts of an earlier run, e.g. 05_01_2026_09_03_07
    #[arg(long)]
    timestamp: Option<String>,

    #[arg(long)]
    artifact_dir: Option<String>,

    #[arg(long)]
    dataset: Option<String>,

    #[arg(long)]
    source: Option<SourceKind>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    test_fraction: Option<f64>,

    #[arg(long)]
    duplicate_keys: Option<KeyPolicy>,

    /// Redo every step even when its output exists
    #[arg(long)]
    force: bool,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<IngestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IngestError) -> u8 {
    match error {
        IngestError::Config(_)
        | IngestError::ConfigRead(_)
        | IngestError::ConfigParse(_)
        | IngestError::InvalidDatasetId(_)
        | IngestError::InvalidTimestamp(_)
        | IngestError::Discovery(_) => 2,
        IngestError::Download { .. }
        | IngestError::DownloadStatus { .. }
        | IngestError::MissingTool(_)
        | IngestError::MissingCredentials(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut settings = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(dataset) = &cli.dataset {
        settings.dataset_id = dataset.parse()?;
    }
    if let Some(dir) = &cli.artifact_dir {
        settings.artifact_dir = dir.into();
    }
    if let Some(source) = cli.source {
        settings.source = source;
    }
    if let Some(seed) = cli.seed {
        settings.seed = seed;
    }
    if let Some(fraction) = cli.test_fraction {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(IngestError::Config(format!(
                "--test-fraction must be in (0, 1), got {fraction}"
            ))
            .into());
        }
        settings.test_fraction = fraction;
    }
    if let Some(policy) = cli.duplicate_keys {
        settings.duplicate_keys = policy;
    }

    let timestamp = match &cli.timestamp {
        Some(value) => value.parse::<RunTimestamp>()?,
        None => RunTimestamp::now(),
    };
    let source_kind = settings.source;
    let pipeline = TrainingPipeline::new(settings, timestamp);
    let options = IngestOptions { force: cli.force };

    let artifact = match source_kind {
        SourceKind::Http => run_with(&pipeline, KaggleHttpClient::new()?, &options, output_mode)?,
        SourceKind::Cli => run_with(&pipeline, KaggleCli::new(), &options, output_mode)?,
    };

    match output_mode {
        OutputMode::Interactive => print_artifact_summary(&artifact),
        OutputMode::NonInteractive => JsonOutput::print_artifact(&artifact)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?,
    }
    Ok(())
}

fn run_with<S: ArchiveSource>(
    pipeline: &TrainingPipeline,
    source: S,
    options: &IngestOptions,
    output_mode: OutputMode,
) -> Result<IngestionArtifact, IngestError> {
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &StderrProgress,
        OutputMode::NonInteractive => &JsonOutput,
    };
    pipeline.run_pipeline(source, options, sink)
}

fn print_artifact_summary(artifact: &IngestionArtifact) {
    println!("feature store: {}", artifact.feature_store_file_path);
    println!("train:         {}", artifact.train_file_path);
    println!("test:          {}", artifact.test_file_path);
}
