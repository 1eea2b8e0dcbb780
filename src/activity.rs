//! Append-only activity log.
//!
//! Every session action leaves a `[YYYY-MM-DD HH:MM:SS] LEVEL: message` line
//! in a flat text file next to the database. Entries are mirrored to the `log`
//! facade so `RUST_LOG` users see them too.

use std::{
    fs::OpenOptions,
    io::Write,
    path::Path,
};

use anyhow::{Context, Result};
use chrono::Local;
use log::{error, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Error,
}

impl ActivityLevel {
    fn label(self) -> &'static str {
        match self {
            ActivityLevel::Info => "INFO",
            ActivityLevel::Error => "ERROR",
        }
    }
}

pub struct ActivityLog {
    sink: Box<dyn Write>,
}

impl ActivityLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Opening activity log {path:?}"))?;
        Ok(Self::from_writer(file))
    }

    fn from_writer(writer: impl Write + 'static) -> Self {
        Self {
            sink: Box::new(writer),
        }
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        info!("{}", message.as_ref());
        self.append(ActivityLevel::Info, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        error!("{}", message.as_ref());
        self.append(ActivityLevel::Error, message.as_ref());
    }

    fn append(&mut self, level: ActivityLevel, message: &str) {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let written = writeln!(self.sink, "[{timestamp}] {}: {message}", level.label())
            .and_then(|_| self.sink.flush());
        if let Err(err) = written {
            warn!("Failed to append to activity log: {err}");
        }
    }
}

/// Parses one activity line into its level and message.
pub fn parse_line(line: &str) -> Option<(ActivityLevel, &str)> {
    let rest = line.strip_prefix('[')?;
    let (_, rest) = rest.split_once("] ")?;
    if let Some(message) = rest.strip_prefix("INFO: ") {
        Some((ActivityLevel::Info, message))
    } else {
        rest.strip_prefix("ERROR: ")
            .map(|message| (ActivityLevel::Error, message))
    }
}
