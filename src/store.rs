//! SQLite-backed relational store.
//!
//! One [`Store`] wraps one connection for the life of a session. The store
//! issues three kinds of statements on behalf of ingestion (existence and
//! metadata lookups, table definition, bulk row insertion) and runs ad-hoc
//! user queries verbatim.

use std::path::{Path, PathBuf};

use log::{debug, info};
use rusqlite::{
    Connection, OptionalExtension, ToSql, params, params_from_iter,
    types::{ToSqlOutput, Value as SqlValue, ValueRef},
};

use crate::{
    dataset::{Dataset, Value},
    error::{ChatError, Result},
    inference::StorageKind,
    schema::{self, TableSchema},
};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredColumn {
    pub name: String,
    pub declared_type: String,
    /// `None` when the declared type is not one this tool creates.
    pub kind: Option<StorageKind>,
}

/// An existing table as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTable {
    pub name: String,
    pub columns: Vec<StoredColumn>,
}

impl StoredTable {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows changed by a statement that returns no result set.
    pub affected: Option<usize>,
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!("Opened SQLite database {path:?}");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn stored_table(&self, name: &str) -> Result<Option<StoredTable>> {
        if !self.table_exists(name)? {
            return Ok(None);
        }
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![name], |row| {
                let declared_type: String = row.get(1)?;
                Ok(StoredColumn {
                    name: row.get(0)?,
                    kind: declared_type.parse().ok(),
                    declared_type,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(StoredTable {
            name: name.to_string(),
            columns,
        }))
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Recreates `schema`'s table and fills it with every dataset row inside a
    /// single transaction. Prior contents of that table are discarded.
    pub fn write_table(&mut self, schema: &TableSchema, dataset: &Dataset) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let drop_sql = schema.drop_statement();
        let create_sql = schema.create_statement();
        debug!("{drop_sql}");
        tx.execute_batch(&drop_sql)?;
        debug!("{create_sql}");
        tx.execute_batch(&create_sql)?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(&schema.insert_statement())?;
            for row in dataset.rows() {
                inserted += stmt.execute(params_from_iter(row))?;
            }
        }
        tx.commit()?;
        info!("Wrote {inserted} row(s) into '{}'", schema.name());
        Ok(inserted)
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        schema::validate_identifier(table)?;
        if !self.table_exists(table)? {
            return Err(ChatError::UnknownTable(table.to_string()));
        }
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Runs one user-supplied statement. Result sets are rendered to strings;
    /// statements without a result set report the number of changed rows.
    pub fn query(&self, sql: &str) -> Result<QueryOutput> {
        let mut stmt = self.conn.prepare(sql)?;
        if stmt.column_count() == 0 {
            let affected = stmt.execute([])?;
            return Ok(QueryOutput {
                affected: Some(affected),
                ..QueryOutput::default()
            });
        }
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get_ref(idx).map(render_cell))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(QueryOutput {
            columns,
            rows,
            affected: None,
        })
    }

    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, err)| ChatError::Store(err))?;
        info!("Closed SQLite database {path:?}");
        Ok(())
    }
}

fn render_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{f:?}"),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => format!("<{} byte blob>", bytes.len()),
    }
}
