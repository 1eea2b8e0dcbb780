use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{
        DEFAULT_BASE_URL, DEFAULT_DB_PATH, DEFAULT_LOG_PATH, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
        DEFAULT_TEMPERATURE,
    },
    conflict::{ConflictAction, ConflictScope},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Load CSV files into SQLite and query them", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the interactive menu session
    Chat(ChatArgs),
    /// Load a CSV file into a table
    Ingest(IngestArgs),
    /// List the tables stored in the database
    Tables,
    /// Run a SQL statement, or ask the assistant to write one
    Query(QueryArgs),
    /// Show the table definition a CSV file would be stored under
    Schema(SchemaArgs),
}

#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// SQLite database file (created when missing)
    #[arg(long, global = true, env = "SQLITE_CHAT_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,
    /// Append-only activity log file
    #[arg(long = "log-file", global = true, env = "SQLITE_CHAT_LOG", default_value = DEFAULT_LOG_PATH)]
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CsvArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Rewrite column headers into snake_case identifiers
    #[arg(long = "normalize-headers")]
    pub normalize_headers: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AssistantArgs {
    /// API key for the chat-completions endpoint
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API
    #[arg(long = "api-base", env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Model used to generate SQL
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
    /// Completion token limit
    #[arg(long = "max-tokens", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    /// Sampling temperature
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Let the query action translate natural language into SQL
    #[arg(long)]
    pub assistant: bool,
    /// Which existing tables trigger a conflict prompt
    #[arg(long = "conflict-scope", value_enum, default_value_t = ConflictScope::Any)]
    pub conflict_scope: ConflictScope,
    #[command(flatten)]
    pub csv: CsvArgs,
    #[command(flatten)]
    pub llm: AssistantArgs,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// CSV file to load
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Target table name
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// How to resolve a clash with an existing table (aborts when omitted)
    #[arg(long = "on-conflict", value_enum)]
    pub on_conflict: Option<ConflictAction>,
    /// Suffix for the renamed table, producing `<table>_<suffix>`
    #[arg(long, required_if_eq("on_conflict", "rename"))]
    pub suffix: Option<String>,
    /// Which existing tables count as a conflict
    #[arg(long = "conflict-scope", value_enum, default_value_t = ConflictScope::Any)]
    pub conflict_scope: ConflictScope,
    #[command(flatten)]
    pub csv: CsvArgs,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// SQL statement to execute
    #[arg(long, conflicts_with = "ask", required_unless_present = "ask")]
    pub sql: Option<String>,
    /// Natural-language description of the query to generate
    #[arg(long, requires = "table")]
    pub ask: Option<String>,
    /// Table the generated query should target
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    #[command(flatten)]
    pub llm: AssistantArgs,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Table name used in the generated statement
    #[arg(short = 't', long = "table", default_value = "data")]
    pub table: String,
    #[command(flatten)]
    pub csv: CsvArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "pipe" | "|" => Ok(b'|'),
        "semicolon" | ";" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (None, _) => Err("Delimiter cannot be empty".to_string()),
                (Some(_), Some(_)) => Err("Delimiter must be a single character".to_string()),
                (Some(c), None) if !c.is_ascii() => Err("Delimiter must be ASCII".to_string()),
                (Some(c), None) => Ok(c as u8),
            }
        }
    }
}
