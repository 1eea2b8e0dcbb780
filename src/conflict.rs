//! Detection and resolution of clashes between a candidate table and a table
//! that already exists in the store.
//!
//! A check starts with a read-only existence lookup. When a conflict is
//! flagged, a [`ConflictPrompt`] supplies exactly one [`Resolution`]; any
//! answer that is not overwrite, rename or skip becomes [`Resolution::Abort`].

use std::{collections::BTreeSet, fmt};

use clap::ValueEnum;
use log::{info, warn};

use crate::{
    error::Result,
    schema::TableSchema,
    store::{Store, StoredTable},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Drop the existing table and recreate it from the new data.
    Overwrite,
    /// Create `<original>_<suffix>` and leave the existing table alone.
    Rename(String),
    Skip,
    Abort,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Overwrite => f.write_str("overwrite"),
            Resolution::Rename(suffix) => write!(f, "rename with suffix '{suffix}'"),
            Resolution::Skip => f.write_str("skip"),
            Resolution::Abort => f.write_str("abort"),
        }
    }
}

/// Which existing tables count as a conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ConflictScope {
    /// Any existing table with the target name.
    #[default]
    Any,
    /// Only tables whose column names equal the candidate's; others are
    /// replaced without asking.
    MatchingColumns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ConflictAction {
    Overwrite,
    Rename,
    Skip,
}

impl ConflictAction {
    /// Accepts the action name, its initial, or its menu number.
    pub fn parse_choice(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "o" | "overwrite" => Some(ConflictAction::Overwrite),
            "2" | "r" | "rename" => Some(ConflictAction::Rename),
            "3" | "s" | "skip" => Some(ConflictAction::Skip),
            _ => None,
        }
    }

    pub fn into_resolution(self, suffix: Option<&str>) -> Resolution {
        match self {
            ConflictAction::Overwrite => Resolution::Overwrite,
            ConflictAction::Rename => match suffix.map(str::trim) {
                Some(suffix) if !suffix.is_empty() => Resolution::Rename(suffix.to_string()),
                _ => Resolution::Abort,
            },
            ConflictAction::Skip => Resolution::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConflict {
    pub existing: StoredTable,
    /// True when the existing column names equal the candidate's.
    pub same_columns: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictCheck {
    NoExistingTable,
    Detected(SchemaConflict),
    /// A table exists but falls outside the configured scope.
    Unguarded(StoredTable),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// Nothing to resolve; create under the original name.
    NoConflict,
    Resolved(Resolution),
}

pub trait ConflictPrompt {
    fn choose(&mut self, conflict: &SchemaConflict, candidate: &TableSchema) -> Resolution;
}

/// A prompt that answers every conflict the same way; `None` aborts.
#[derive(Debug, Clone, Default)]
pub struct FixedResolution(pub Option<Resolution>);

impl ConflictPrompt for FixedResolution {
    fn choose(&mut self, _conflict: &SchemaConflict, _candidate: &TableSchema) -> Resolution {
        self.0.clone().unwrap_or(Resolution::Abort)
    }
}

pub fn same_column_set<'a>(
    left: impl IntoIterator<Item = &'a str>,
    right: impl IntoIterator<Item = &'a str>,
) -> bool {
    let left = left
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect::<BTreeSet<_>>();
    let right = right
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect::<BTreeSet<_>>();
    left == right
}

pub fn check_conflict(store: &Store, candidate: &TableSchema, scope: ConflictScope) -> Result<ConflictCheck> {
    let Some(existing) = store.stored_table(candidate.name())? else {
        return Ok(ConflictCheck::NoExistingTable);
    };
    let same_columns = same_column_set(existing.column_names(), candidate.column_names());
    if same_columns || scope == ConflictScope::Any {
        Ok(ConflictCheck::Detected(SchemaConflict {
            existing,
            same_columns,
        }))
    } else {
        Ok(ConflictCheck::Unguarded(existing))
    }
}

pub fn resolve_conflict(
    store: &Store,
    candidate: &TableSchema,
    scope: ConflictScope,
    prompt: &mut dyn ConflictPrompt,
) -> Result<ConflictOutcome> {
    match check_conflict(store, candidate, scope)? {
        ConflictCheck::NoExistingTable => Ok(ConflictOutcome::NoConflict),
        ConflictCheck::Unguarded(existing) => {
            warn!(
                "Table '{}' exists with different columns ({}); it will be replaced",
                existing.name,
                existing.column_names().join(", ")
            );
            Ok(ConflictOutcome::NoConflict)
        }
        ConflictCheck::Detected(conflict) => {
            let resolution = prompt.choose(&conflict, candidate);
            info!(
                "Conflict on table '{}' resolved as {resolution}",
                candidate.name()
            );
            Ok(ConflictOutcome::Resolved(resolution))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_accept_names_initials_and_numbers() {
        assert_eq!(ConflictAction::parse_choice(" Rename "), Some(ConflictAction::Rename));
        assert_eq!(ConflictAction::parse_choice("o"), Some(ConflictAction::Overwrite));
        assert_eq!(ConflictAction::parse_choice("3"), Some(ConflictAction::Skip));
        assert_eq!(ConflictAction::parse_choice("maybe"), None);
    }

    #[test]
    fn rename_without_suffix_aborts() {
        assert_eq!(ConflictAction::Rename.into_resolution(Some("  ")), Resolution::Abort);
        assert_eq!(
            ConflictAction::Rename.into_resolution(Some("v2")),
            Resolution::Rename("v2".to_string())
        );
    }

    #[test]
    fn column_sets_compare_by_name_only() {
        assert!(same_column_set(["id", "Name"], ["name", "id"]));
        assert!(!same_column_set(["id"], ["id", "name"]));
    }
}
