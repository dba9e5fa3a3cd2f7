use std::collections::HashMap;
use std::fmt;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::store;

/// Column type label, using the names pandas reports for a CSV-loaded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Int64 => write!(f, "int64"),
            DType::Float64 => write!(f, "float64"),
            DType::Bool => write!(f, "bool"),
            DType::Object => write!(f, "object"),
        }
    }
}

/// In-memory CSV table. Cells keep their textual form so a load/save cycle
/// reproduces the file byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, IngestError> {
        if let Some(pos) = rows.iter().position(|row| row.len() != columns.len()) {
            return Err(IngestError::Table {
                path: Utf8Path::new("<memory>").to_path_buf(),
                message: format!(
                    "row {pos} has {} fields, header has {}",
                    rows[pos].len(),
                    columns.len()
                ),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn read_csv(path: &Utf8Path) -> Result<Self, IngestError> {
        let fail = |message: String| IngestError::Table {
            path: path.to_path_buf(),
            message,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path.as_std_path())
            .map_err(|err| fail(err.to_string()))?;
        let columns = reader
            .headers()
            .map_err(|err| fail(err.to_string()))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| fail(err.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), IngestError> {
        let fail = |message: String| IngestError::Table {
            path: path.to_path_buf(),
            message,
        };
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .map_err(|err| fail(err.to_string()))?;
        for row in &self.rows {
            writer.write_record(row).map_err(|err| fail(err.to_string()))?;
        }
        let bytes = writer.into_inner().map_err(|err| fail(err.to_string()))?;
        store::write_bytes_atomic(path, &bytes)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns `false` when `from` is not a column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|values| values[idx].as_str())
    }

    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&idx| self.rows[idx].clone()).collect(),
        }
    }

    /// Stacks tables vertically. Columns are the union in first-seen order;
    /// cells a table does not have are left empty.
    pub fn concat(tables: Vec<Table>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for table in &tables {
            for column in &table.columns {
                if !positions.contains_key(column) {
                    positions.insert(column.clone(), columns.len());
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(Table::len).sum());
        for table in tables {
            if table.columns == columns {
                rows.extend(table.rows);
                continue;
            }
            let mapping = table
                .columns
                .iter()
                .map(|column| positions[column])
                .collect::<Vec<_>>();
            for row in table.rows {
                let mut widened = vec![String::new(); columns.len()];
                for (value, &target) in row.into_iter().zip(&mapping) {
                    widened[target] = value;
                }
                rows.push(widened);
            }
        }
        Self { columns, rows }
    }

    pub fn dtypes(&self) -> Vec<(String, DType)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let dtype = infer_dtype(self.rows.iter().map(|row| row[idx].as_str()));
                (name.clone(), dtype)
            })
            .collect()
    }
}

/// Missing cells turn integer columns into floats and boolean columns into
/// objects, the same way a NaN does in pandas. An all-missing column is float.
pub fn infer_dtype<'a>(values: impl Iterator<Item = &'a str>) -> DType {
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;
    let mut missing = false;
    let mut present = false;

    for value in values {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("nan") || value == "NA" {
            missing = true;
            continue;
        }
        present = true;
        if all_int && value.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && value.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_bool && !matches!(value, "True" | "False" | "true" | "false" | "TRUE" | "FALSE") {
            all_bool = false;
        }
        if !all_int && !all_float && !all_bool {
            return DType::Object;
        }
    }

    if !present {
        return DType::Float64;
    }
    if all_int {
        return if missing { DType::Float64 } else { DType::Int64 };
    }
    if all_float {
        return DType::Float64;
    }
    if all_bool && !missing {
        return DType::Bool;
    }
    DType::Object
}
