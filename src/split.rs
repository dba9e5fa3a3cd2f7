use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, info_span};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::IngestionConfig;
use crate::error::IngestError;
use crate::table::Table;

/// Absorbs float noise such as `0.1 * 30 == 3.0000000000000004`.
const FRACTION_EPSILON: f64 = 1e-9;

/// `(train, test)` row counts for `rows` rows: the test side gets
/// `ceil(test_fraction * rows)` and both sides must be non-empty.
pub fn split_counts(rows: usize, test_fraction: f64) -> Result<(usize, usize), IngestError> {
    if rows == 0 {
        return Err(IngestError::Split("merged table has no rows".to_string()));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(IngestError::Split(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n_test = ((test_fraction * rows as f64) - FRACTION_EPSILON).ceil().max(0.0) as usize;
    let n_train = rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(IngestError::Split(format!(
            "{rows} rows with test fraction {test_fraction} leaves an empty side \
             (train={n_train}, test={n_test})"
        )));
    }
    Ok((n_train, n_test))
}

/// Shuffles row positions with a seeded RNG; the first `n_test` positions
/// form the test set. Identical input, fraction and seed give identical sets.
pub fn split(table: &Table, test_fraction: f64, seed: u64) -> Result<(Table, Table), IngestError> {
    let (_, n_test) = split_counts(table.len(), test_fraction)?;
    let mut indices = (0..table.len()).collect::<Vec<_>>();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((table.select_rows(train_idx), table.select_rows(test_idx)))
}

pub struct Splitter<'a> {
    config: &'a IngestionConfig,
}

impl<'a> Splitter<'a> {
    pub fn new(config: &'a IngestionConfig) -> Self {
        Self { config }
    }

    /// Splits and always overwrites the train and test files.
    pub fn split_and_persist(
        &self,
        table: &Table,
        sink: &dyn ProgressSink,
    ) -> Result<(Table, Table), IngestError> {
        let _span = info_span!("split", seed = self.config.seed).entered();
        let (train, test) = split(table, self.config.test_fraction, self.config.seed)?;

        train.write_csv(&self.config.train_path)?;
        test.write_csv(&self.config.test_path)?;

        info!(
            train = train.len(),
            test = test.len(),
            train_path = %self.config.train_path,
            test_path = %self.config.test_path,
            "train/test split written"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Split; train={} test={}",
                train.len(),
                test.len()
            ),
            elapsed: None,
        });
        Ok((train, test))
    }
}
