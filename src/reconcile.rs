//! Turns the extracted competition tree into one merged feature table.
//!
//! The training data ships as weekly pairs of files: `input_*` files carry
//! tracking features and `output_*` files carry the positions to predict, both
//! keyed by (game, play, player, frame). Each pair is inner-joined on that key
//! and the per-week results are stacked.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::{debug, info, info_span};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::{IngestionConfig, target_name};
use crate::domain::KeyPolicy;
use crate::error::IngestError;
use crate::schema::SchemaDescriptor;
use crate::store;
use crate::table::Table;

const PARTITION_DIR_MARKER: &str = "train";
const OUTPUT_COLLISION_SUFFIX: &str = "_output";

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    pub path: Utf8PathBuf,
    /// Last run of digits in the file stem, e.g. `1` for `input_2023_w01.csv`.
    pub label: Option<u64>,
}

impl PartitionFile {
    pub fn new(path: Utf8PathBuf) -> Self {
        let label = path
            .file_stem()
            .and_then(|stem| DIGITS.find_iter(stem).last())
            .and_then(|found| found.as_str().parse().ok());
        Self { path, label }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPair {
    pub input: PartitionFile,
    pub output: PartitionFile,
}

/// Columns and policy used to join one input/output pair.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub key_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub duplicate_keys: KeyPolicy,
}

impl JoinSpec {
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            key_columns: config.key_columns.clone(),
            target_columns: config.target_columns.clone(),
            duplicate_keys: config.duplicate_keys,
        }
    }
}

pub struct Reconciler<'a> {
    config: &'a IngestionConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a IngestionConfig) -> Self {
        Self { config }
    }

    /// Returns the merged table, loading the feature store file when a
    /// previous run already produced it.
    pub fn reconcile(
        &self,
        extract_dir: &Utf8Path,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Table, IngestError> {
        let _span = info_span!("reconcile").entered();
        let merged_path = &self.config.feature_store_path;

        if !force && merged_path.as_std_path().is_file() {
            let table = Table::read_csv(merged_path)?;
            info!(%merged_path, rows = table.len(), "feature store present, loading it");
            sink.event(ProgressEvent {
                message: format!("phase=Reconcile; loaded {merged_path}"),
                elapsed: None,
            });
            return Ok(table);
        }

        let start = Instant::now();
        let partition_dir = discover_partition_dir(extract_dir)?;
        let files = store::list_files(&partition_dir)?;
        let pairs = pair_partitions(&partition_dir, &files)?;
        info!(%partition_dir, partitions = pairs.len(), "partition files paired");

        let spec = JoinSpec::from_config(self.config);
        let mut joined = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let input = Table::read_csv(&pair.input.path)?;
            let output = Table::read_csv(&pair.output.path)?;
            let table = join_partition(pair, &input, output, &spec)?;
            debug!(
                input = %pair.input.path,
                output = %pair.output.path,
                rows = table.len(),
                "partition joined"
            );
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Reconcile; joined {} ({} rows)",
                    pair.input.path.file_name().unwrap_or(pair.input.path.as_str()),
                    table.len()
                ),
                elapsed: None,
            });
            joined.push(table);
        }

        let merged = Table::concat(joined);
        // The merged file marks the step done, so it goes last.
        SchemaDescriptor::from_table(&merged).write(&self.config.schema_path)?;
        merged.write_csv(merged_path)?;

        let elapsed = start.elapsed();
        info!(
            rows = merged.len(),
            columns = merged.width(),
            %merged_path,
            "feature store written"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Reconcile; merged {} rows x {} columns",
                merged.len(),
                merged.width()
            ),
            elapsed: Some(elapsed),
        });
        Ok(merged)
    }
}

pub fn discover_partition_dir(root: &Utf8Path) -> Result<Utf8PathBuf, IngestError> {
    if !root.as_std_path().is_dir() {
        return Err(IngestError::Discovery(root.to_path_buf()));
    }
    let candidates = store::walk_dirs(root)?;
    select_partition_dir(root, &candidates)
}

/// Picks the directory holding the training partitions out of every
/// directory below `root`: the name must contain "train" (any case), the
/// shallowest match wins and ties go to the lexicographically first path.
pub fn select_partition_dir(
    root: &Utf8Path,
    candidates: &[Utf8PathBuf],
) -> Result<Utf8PathBuf, IngestError> {
    candidates
        .iter()
        .filter(|dir| {
            dir.file_name()
                .map(|name| name.to_lowercase().contains(PARTITION_DIR_MARKER))
                .unwrap_or(false)
        })
        .min_by_key(|dir| {
            let depth = dir
                .strip_prefix(root)
                .map(|relative| relative.components().count())
                .unwrap_or(usize::MAX);
            (depth, dir.as_str().to_owned())
        })
        .cloned()
        .ok_or_else(|| IngestError::Discovery(root.to_path_buf()))
}

/// Splits the CSV files of `dir` into input and output files and pairs them
/// by position after sorting on the partition label.
pub fn pair_partitions(
    dir: &Utf8Path,
    files: &[Utf8PathBuf],
) -> Result<Vec<PartitionPair>, IngestError> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for path in files {
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let Some(name) = path.file_name().map(str::to_lowercase) else {
            continue;
        };
        if !is_csv {
            continue;
        }
        if name.contains("input") {
            inputs.push(PartitionFile::new(path.clone()));
        } else if name.contains("output") {
            outputs.push(PartitionFile::new(path.clone()));
        }
    }

    if inputs.len() != outputs.len() {
        return Err(IngestError::CountMismatch {
            dir: dir.to_path_buf(),
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }
    if inputs.is_empty() {
        return Err(IngestError::Discovery(dir.to_path_buf()));
    }

    let order = |file: &PartitionFile| (file.label, file.path.clone());
    inputs.sort_by_key(order);
    outputs.sort_by_key(order);

    inputs
        .into_iter()
        .zip(outputs)
        .enumerate()
        .map(|(index, (input, output))| match (input.label, output.label) {
            (Some(left), Some(right)) if left != right => Err(IngestError::PartitionMismatch {
                index,
                input: input.path.to_string(),
                output: output.path.to_string(),
            }),
            _ => Ok(PartitionPair { input, output }),
        })
        .collect()
}

/// Inner-joins one partition. The output's target columns are renamed to
/// `target_<name>`; other output columns that clash with an input column get
/// an `_output` suffix. Rows follow input order, then output order per key.
pub fn join_partition(
    pair: &PartitionPair,
    input: &Table,
    mut output: Table,
    spec: &JoinSpec,
) -> Result<Table, IngestError> {
    for column in &spec.target_columns {
        if !output.rename_column(column, &target_name(column)) {
            return Err(IngestError::Join {
                path: pair.output.path.clone(),
                message: format!("missing target column {column}"),
            });
        }
    }

    let input_keys = key_indices(input, &spec.key_columns, &pair.input.path)?;
    let output_keys = key_indices(&output, &spec.key_columns, &pair.output.path)?;

    let mut lookup: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
    for (row_idx, row) in output.rows().iter().enumerate() {
        let key = extract_key(row, &output_keys);
        let matches = lookup.entry(key).or_default();
        if spec.duplicate_keys == KeyPolicy::Reject && !matches.is_empty() {
            return Err(duplicate_key(&pair.output.path, &spec.key_columns, row, &output_keys));
        }
        matches.push(row_idx);
    }

    let carried = output
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !output_keys.contains(idx))
        .map(|(idx, name)| {
            let name = if input.column_index(name).is_some() {
                format!("{name}{OUTPUT_COLLISION_SUFFIX}")
            } else {
                name.clone()
            };
            (idx, name)
        })
        .collect::<Vec<_>>();

    let mut columns = input.columns().to_vec();
    columns.extend(carried.iter().map(|(_, name)| name.clone()));

    let mut seen: HashSet<Vec<&str>> = HashSet::new();
    let mut rows = Vec::new();
    for row in input.rows() {
        let key = extract_key(row, &input_keys);
        if spec.duplicate_keys == KeyPolicy::Reject && !seen.insert(key.clone()) {
            return Err(duplicate_key(&pair.input.path, &spec.key_columns, row, &input_keys));
        }
        let Some(matches) = lookup.get(&key) else {
            continue;
        };
        for &out_idx in matches {
            let out_row = &output.rows()[out_idx];
            let mut merged = row.clone();
            merged.extend(carried.iter().map(|(idx, _)| out_row[*idx].clone()));
            rows.push(merged);
        }
    }

    Table::new(columns, rows)
}

fn key_indices(
    table: &Table,
    key_columns: &[String],
    path: &Utf8Path,
) -> Result<Vec<usize>, IngestError> {
    key_columns
        .iter()
        .map(|column| {
            table.column_index(column).ok_or_else(|| IngestError::Join {
                path: path.to_path_buf(),
                message: format!("missing key column {column}"),
            })
        })
        .collect()
}

fn extract_key<'r>(row: &'r [String], indices: &[usize]) -> Vec<&'r str> {
    indices.iter().map(|&idx| row[idx].trim()).collect()
}

fn duplicate_key(
    path: &Utf8Path,
    key_columns: &[String],
    row: &[String],
    indices: &[usize],
) -> IngestError {
    let key = key_columns
        .iter()
        .zip(indices)
        .map(|(name, &idx)| format!("{name}={}", row[idx].trim()))
        .collect::<Vec<_>>()
        .join(", ");
    IngestError::DuplicateKey {
        path: path.to_path_buf(),
        key: format!("({key})"),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn paths(values: &[&str]) -> Vec<Utf8PathBuf> {
        values.iter().map(Utf8PathBuf::from).collect()
    }

    #[test]
    fn partition_label_is_last_digit_run() {
        assert_eq!(PartitionFile::new("train/input_2023_w01.csv".into()).label, Some(1));
        assert_eq!(PartitionFile::new("train/output_2023_w18.csv".into()).label, Some(18));
        assert_eq!(PartitionFile::new("train/input.csv".into()).label, None);
    }

    #[test]
    fn selects_shallowest_train_dir() {
        let root = Utf8Path::new("/data");
        let candidates = paths(&[
            "/data/extra",
            "/data/extra/train_old",
            "/data/train",
            "/data/Training",
        ]);
        let selected = select_partition_dir(root, &candidates).unwrap();
        assert_eq!(selected, "/data/Training");
    }

    #[test]
    fn discovery_fails_without_train_dir() {
        let root = Utf8Path::new("/data");
        let err = select_partition_dir(root, &paths(&["/data/test", "/data/docs"])).unwrap_err();
        assert_matches!(err, IngestError::Discovery(_));
    }

    #[test]
    fn pairs_sort_numerically_by_week() {
        let dir = Utf8Path::new("/data/train");
        let files = paths(&[
            "/data/train/input_2023_w10.csv",
            "/data/train/input_2023_w9.csv",
            "/data/train/output_2023_w9.csv",
            "/data/train/output_2023_w10.csv",
            "/data/train/README.md",
        ]);
        let pairs = pair_partitions(dir, &files).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].input.label, Some(9));
        assert_eq!(pairs[0].output.path, "/data/train/output_2023_w9.csv");
        assert_eq!(pairs[1].output.label, Some(10));
    }

    #[test]
    fn misaligned_weeks_are_rejected() {
        let dir = Utf8Path::new("/data/train");
        let files = paths(&[
            "/data/train/input_2023_w01.csv",
            "/data/train/output_2023_w02.csv",
        ]);
        let err = pair_partitions(dir, &files).unwrap_err();
        assert_matches!(err, IngestError::PartitionMismatch { index: 0, .. });
    }
}
