use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::store;
use crate::table::{DType, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub metadata: SchemaMetadata,
    pub schema: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: DType,
}

impl SchemaDescriptor {
    pub fn from_table(table: &Table) -> Self {
        Self {
            metadata: SchemaMetadata {
                rows: table.len(),
                columns: table.width(),
            },
            schema: table
                .dtypes()
                .into_iter()
                .map(|(name, dtype)| ColumnSchema { name, dtype })
                .collect(),
        }
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), IngestError> {
        let content = serde_yaml::to_string(self).map_err(|err| IngestError::Schema {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        store::write_bytes_atomic(path, content.as_bytes())
    }

    pub fn read(path: &Utf8Path) -> Result<Self, IngestError> {
        let fail = |message: String| IngestError::Schema {
            path: path.to_path_buf(),
            message,
        };
        let content = fs::read_to_string(path.as_std_path()).map_err(|err| fail(err.to_string()))?;
        serde_yaml::from_str(&content).map_err(|err| fail(err.to_string()))
    }
}
