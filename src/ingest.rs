//! CSV ingestion: load, infer, resolve conflicts, materialize, insert.

use std::path::{Path, PathBuf};

use log::info;

use crate::{
    conflict::{self, ConflictOutcome, ConflictPrompt, ConflictScope, Resolution},
    dataset::{self, ColumnKind, LoadOptions},
    error::{ChatError, Result},
    inference,
    schema::{self, TableSchema},
    store::Store,
};

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub path: PathBuf,
    pub table: String,
    pub load: LoadOptions,
    pub scope: ConflictScope,
}

impl IngestRequest {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            load: LoadOptions::default(),
            scope: ConflictScope::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Table that received the rows; differs from the request under rename.
    pub table: String,
    pub rows: usize,
    pub schema: TableSchema,
    /// `None` when no conflict had to be resolved.
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPreview {
    pub schema: TableSchema,
    /// Kind the loader detected for each column, in schema order.
    pub detected: Vec<ColumnKind>,
    pub rows: usize,
}

/// Infers the schema a CSV file would be stored under, without touching any
/// store.
pub fn preview_schema(path: &Path, table: &str, options: &LoadOptions) -> Result<SchemaPreview> {
    let dataset = dataset::load_csv(path, options)?;
    let types = inference::infer_column_types(&dataset);
    Ok(SchemaPreview {
        schema: TableSchema::synthesize(table, &types)?,
        detected: dataset.columns().iter().map(|c| c.kind()).collect(),
        rows: dataset.row_count(),
    })
}

pub fn ingest(store: &mut Store, request: &IngestRequest, prompt: &mut dyn ConflictPrompt) -> Result<IngestReport> {
    let dataset = dataset::load_csv(&request.path, &request.load)?;
    info!(
        "Loaded {} row(s) with columns [{}] from {:?}",
        dataset.row_count(),
        dataset.column_names().join(", "),
        request.path
    );
    let types = inference::infer_column_types(&dataset);
    let candidate = TableSchema::synthesize(&request.table, &types)?;

    let (target, resolution) = match conflict::resolve_conflict(store, &candidate, request.scope, prompt)? {
        ConflictOutcome::NoConflict => (candidate, None),
        // The original table is dropped inside the write transaction below.
        ConflictOutcome::Resolved(Resolution::Overwrite) => (candidate, Some(Resolution::Overwrite)),
        ConflictOutcome::Resolved(Resolution::Rename(suffix)) => {
            let renamed = schema::renamed_table(&request.table, &suffix)?;
            // A rename never replaces a table; the write below would drop it.
            if store.table_exists(&renamed)? {
                return Err(ChatError::SchemaConflictUnresolved {
                    table: renamed,
                    resolution: Resolution::Rename(suffix),
                });
            }
            (candidate.with_name(&renamed)?, Some(Resolution::Rename(suffix)))
        }
        ConflictOutcome::Resolved(resolution @ (Resolution::Skip | Resolution::Abort)) => {
            return Err(ChatError::SchemaConflictUnresolved {
                table: request.table.clone(),
                resolution,
            });
        }
    };

    let rows = store.write_table(&target, &dataset)?;
    info!(
        "Ingested {rows} row(s) from {:?} into '{}'",
        request.path,
        target.name()
    );
    Ok(IngestReport {
        table: target.name().to_string(),
        rows,
        schema: target,
        resolution,
    })
}
