#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sqlite_chat::store::Store;
use tempfile::{TempDir, tempdir};

pub const EMPLOYEES_CSV: &str = "id,name,salary\n1,Ann,50000.5\n2,Bo,61000.0\n3,Cy,72500.25\n";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn db_path(&self) -> PathBuf {
        self.path().join("company.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.path().join("activity.txt")
    }

    pub fn open_store(&self) -> Store {
        Store::open(&self.db_path()).expect("open store")
    }
}

/// All rows of `table` ordered by rowid, rendered as strings.
pub fn table_rows(store: &Store, table: &str) -> Vec<Vec<String>> {
    store
        .query(&format!("SELECT * FROM {table} ORDER BY rowid"))
        .expect("select rows")
        .rows
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
