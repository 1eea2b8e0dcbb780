//! Table schema synthesis and identifier validation.
//!
//! Names are spliced into DDL text verbatim, so every table and column name
//! goes through [`validate_identifier`] first. Row values never appear in SQL
//! text; they are bound as parameters by the store.

use std::{collections::HashSet, fmt::Write as _, sync::OnceLock};

use heck::ToSnakeCase;
use itertools::Itertools;
use regex::Regex;

use crate::{
    error::{ChatError, Result},
    inference::{ColumnTypeMap, StorageKind},
};

pub const MAX_IDENTIFIER_LEN: usize = 64;

static IDENTIFIER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn identifier_pattern() -> &'static Regex {
    IDENTIFIER_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ChatError::invalid_identifier(name, "name is empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ChatError::invalid_identifier(
            name,
            format!("longer than {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    if !identifier_pattern().is_match(name) {
        return Err(ChatError::invalid_identifier(
            name,
            "only letters, digits and '_' are allowed and the first character may not be a digit",
        ));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(ChatError::invalid_identifier(
            name,
            "the 'sqlite_' prefix is reserved",
        ));
    }
    Ok(())
}

/// Rewrites an arbitrary header into a snake_case identifier that passes
/// [`validate_identifier`] whenever the header contains any alphanumerics.
pub fn normalize_identifier(raw: &str) -> String {
    let mut normalized = raw
        .trim()
        .to_snake_case()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();
    if normalized.starts_with(|c: char| c.is_ascii_digit()) {
        normalized.insert(0, '_');
    }
    if normalized.to_ascii_lowercase().starts_with("sqlite_") {
        normalized.insert_str(0, "col_");
    }
    normalized.truncate(MAX_IDENTIFIER_LEN);
    normalized
}

/// Name used for a table created under the rename resolution.
pub fn renamed_table(original: &str, suffix: &str) -> Result<String> {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return Err(ChatError::invalid_identifier(
            original,
            "rename suffix is empty",
        ));
    }
    let name = format!("{original}_{suffix}");
    validate_identifier(&name)?;
    Ok(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<(String, StorageKind)>,
}

impl TableSchema {
    /// Builds a schema for `table_name` from inferred column types, keeping
    /// the map's column order.
    pub fn synthesize(table_name: &str, types: &ColumnTypeMap) -> Result<Self> {
        validate_identifier(table_name)?;
        let mut seen = HashSet::with_capacity(types.len());
        let mut columns = Vec::with_capacity(types.len());
        for (column, kind) in types.iter() {
            validate_identifier(column)?;
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(ChatError::invalid_identifier(column, "duplicate column name"));
            }
            columns.push((column.to_string(), kind));
        }
        if columns.is_empty() {
            return Err(ChatError::invalid_identifier(
                table_name,
                "a table needs at least one column",
            ));
        }
        Ok(Self {
            name: table_name.to_string(),
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[(String, StorageKind)] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Same columns under a different, validated table name.
    pub fn with_name(&self, name: &str) -> Result<Self> {
        validate_identifier(name)?;
        Ok(Self {
            name: name.to_string(),
            columns: self.columns.clone(),
        })
    }

    pub fn create_statement(&self) -> String {
        let definitions = self
            .columns
            .iter()
            .map(|(name, kind)| format!("{name} {kind}"))
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({definitions})", self.name)
    }

    pub fn drop_statement(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }

    pub fn insert_statement(&self) -> String {
        let mut placeholders = String::new();
        for idx in 1..=self.columns.len() {
            if idx > 1 {
                placeholders.push_str(", ");
            }
            let _ = write!(placeholders, "?{idx}");
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            self.name,
            self.column_names().join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_follow_allow_list() {
        assert!(validate_identifier("employees").is_ok());
        assert!(validate_identifier("_tmp2").is_ok());
        assert!(validate_identifier("2024_sales").is_err());
        assert!(validate_identifier("drop table x;--").is_err());
        assert!(validate_identifier("sqlite_master").is_err());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }

    #[test]
    fn normalize_produces_valid_identifiers() {
        assert_eq!(normalize_identifier("First Name"), "first_name");
        assert_eq!(normalize_identifier("2024 Total"), "_2024_total");
        assert_eq!(normalize_identifier("OrderId"), "order_id");
        assert!(validate_identifier(&normalize_identifier("Unit Price (EUR)")).is_ok());
    }

    #[test]
    fn insert_statement_uses_numbered_placeholders() {
        let types: ColumnTypeMap = vec![
            ("id".to_string(), StorageKind::Integer),
            ("name".to_string(), StorageKind::Text),
        ]
        .into_iter()
        .collect();
        let schema = TableSchema::synthesize("people", &types).expect("schema");
        assert_eq!(
            schema.insert_statement(),
            "INSERT INTO people (id, name) VALUES (?1, ?2)"
        );
        assert_eq!(schema.drop_statement(), "DROP TABLE IF EXISTS people");
    }

    #[test]
    fn rename_suffix_must_form_a_valid_name() {
        assert_eq!(renamed_table("employees", "v2").unwrap(), "employees_v2");
        assert!(renamed_table("employees", "  ").is_err());
        assert!(renamed_table("employees", "v 2").is_err());
    }
}
