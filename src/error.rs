//! Error taxonomy shared by every session action.
//!
//! Each variant corresponds to one failure class a single action can end in.
//! Command handlers wrap these in `anyhow` with extra context; the interactive
//! session reports them as one line and keeps running.

use std::path::PathBuf;

use thiserror::Error;

use crate::conflict::Resolution;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Failed to load CSV file {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Table '{table}' already exists and the conflict was not resolved ({resolution})")]
    SchemaConflictUnresolved { table: String, resolution: Resolution },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Table '{0}' does not exist")]
    UnknownTable(String),

    #[error("SQL generation failed: {0}")]
    Generation(String),
}

impl ChatError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ChatError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_identifier(name: &str, reason: impl Into<String>) -> Self {
        ChatError::InvalidIdentifier {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
