//! Storage type inference for loaded datasets.

use std::{fmt, str::FromStr};

use anyhow::{Result, bail};

use crate::dataset::{ColumnKind, Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Text,
    Integer,
    Real,
}

impl StorageKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageKind::Text => "TEXT",
            StorageKind::Integer => "INTEGER",
            StorageKind::Real => "REAL",
        }
    }
}

impl From<ColumnKind> for StorageKind {
    fn from(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Text => StorageKind::Text,
            ColumnKind::Integer => StorageKind::Integer,
            ColumnKind::Real => StorageKind::Real,
            ColumnKind::Unrecognized => StorageKind::Text,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Ok(StorageKind::Text),
            "INTEGER" => Ok(StorageKind::Integer),
            "REAL" => Ok(StorageKind::Real),
            other => bail!("Unsupported storage kind '{other}'"),
        }
    }
}

/// Column name to storage kind, in dataset column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTypeMap {
    entries: Vec<(String, StorageKind)>,
}

impl ColumnTypeMap {
    pub fn iter(&self) -> impl Iterator<Item = (&str, StorageKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn get(&self, name: &str) -> Option<StorageKind> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, kind)| *kind)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, StorageKind)> for ColumnTypeMap {
    fn from_iter<I: IntoIterator<Item = (String, StorageKind)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

pub fn infer_column_types(dataset: &Dataset) -> ColumnTypeMap {
    dataset
        .columns()
        .iter()
        .map(|column| (column.name().to_string(), StorageKind::from(column.kind())))
        .collect()
}
