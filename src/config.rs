//! Runtime configuration assembled from command-line flags and environment.

use std::path::PathBuf;

use anyhow::{Result, bail, ensure};

use crate::{
    cli::{AssistantArgs, CsvArgs, StoreArgs},
    conflict::ConflictScope,
    dataset::LoadOptions,
};

pub const DEFAULT_DB_PATH: &str = "company.db";
pub const DEFAULT_LOG_PATH: &str = "error_log.txt";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub load: LoadOptions,
    pub scope: ConflictScope,
}

impl SessionConfig {
    pub fn new(store: &StoreArgs, csv: &CsvArgs, scope: ConflictScope) -> Self {
        Self {
            db_path: store.db.clone(),
            log_path: store.log_file.clone(),
            load: load_options(csv),
            scope,
        }
    }
}

pub fn load_options(csv: &CsvArgs) -> LoadOptions {
    LoadOptions {
        delimiter: csv.delimiter,
        input_encoding: csv.input_encoding.clone(),
        normalize_headers: csv.normalize_headers,
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl AssistantConfig {
    /// Fails when no API key is configured; callers treat this as a startup
    /// error.
    pub fn from_args(args: &AssistantArgs) -> Result<Self> {
        let api_key = match args.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => bail!("OpenAI API key not found. Please set the OPENAI_API_KEY environment variable."),
        };
        ensure!(
            (0.0..=2.0).contains(&args.temperature),
            "Temperature must be between 0 and 2 (got {})",
            args.temperature
        );
        ensure!(args.max_tokens > 0, "Max tokens must be positive");
        Ok(Self {
            api_key,
            base_url: args.base_url.clone(),
            model: args.model.clone(),
            max_tokens: args.max_tokens,
            temperature: args.temperature,
        })
    }
}
