//! Interactive menu session.
//!
//! A [`SessionContext`] owns everything an action needs (the store handle,
//! the activity log and the optional SQL generator) and is threaded through
//! every action explicitly. Each action catches its own failure, logs it in
//! full and prints a one-line message; only exit or end of input ends the
//! session.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::{
    activity::ActivityLog,
    assistant::SqlGenerator,
    config::SessionConfig,
    conflict::{ConflictAction, ConflictPrompt, ConflictScope, Resolution, SchemaConflict},
    dataset::LoadOptions,
    error::ChatError,
    ingest::{self, IngestRequest},
    schema::TableSchema,
    store::{QueryOutput, Store},
    table,
};

pub struct SessionContext {
    pub store: Store,
    pub activity: ActivityLog,
    pub generator: Option<Box<dyn SqlGenerator>>,
    pub load: LoadOptions,
    pub scope: ConflictScope,
}

impl SessionContext {
    pub fn open(config: &SessionConfig, generator: Option<Box<dyn SqlGenerator>>) -> Result<Self> {
        let activity = ActivityLog::open(&config.log_path)?;
        let store = Store::open(&config.db_path)
            .with_context(|| format!("Opening database {:?}", config.db_path))?;
        Ok(Self {
            store,
            activity,
            generator,
            load: config.load.clone(),
            scope: config.scope,
        })
    }

    pub fn new(store: Store, activity: ActivityLog) -> Self {
        Self {
            store,
            activity,
            generator: None,
            load: LoadOptions::default(),
            scope: ConflictScope::default(),
        }
    }

    pub fn with_generator(mut self, generator: Box<dyn SqlGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Releases the store handle and records the close.
    pub fn close(self) -> crate::error::Result<()> {
        let SessionContext {
            store,
            mut activity,
            ..
        } = self;
        match store.close() {
            Ok(()) => {
                activity.info("SQLite connection closed.");
                Ok(())
            }
            Err(err) => {
                activity.error(format!("Failed to close SQLite connection: {err}"));
                Err(err)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Load,
    ListTables,
    Query,
    Exit,
}

impl MenuChoice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Load),
            "2" => Some(MenuChoice::ListTables),
            "3" => Some(MenuChoice::Query),
            "4" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

enum Step {
    Continue,
    Exit,
}

/// Runs the menu loop until the user exits or input ends. Only I/O failures
/// on the terminal itself are returned.
pub fn run_session<R: BufRead, W: Write>(ctx: &mut SessionContext, input: R, output: W) -> Result<()> {
    let mut menu = Menu { ctx, input, output };
    menu.run()
}

struct Menu<'a, R, W> {
    ctx: &'a mut SessionContext,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Menu<'_, R, W> {
    fn run(&mut self) -> Result<()> {
        self.ctx.activity.info("Session started.");
        loop {
            self.print_menu()?;
            let Some(choice) = prompt_line(&mut self.input, &mut self.output, "Enter the number of your choice: ")?
            else {
                self.ctx.activity.info("Input closed; ending session.");
                return Ok(());
            };
            let Some(choice) = MenuChoice::parse(&choice) else {
                writeln!(self.output, "Invalid choice. Please enter a valid number (1-4).")?;
                continue;
            };
            let outcome = match choice {
                MenuChoice::Load => self.load_csv(),
                MenuChoice::ListTables => self.list_tables(),
                MenuChoice::Query => self.run_query(),
                MenuChoice::Exit => {
                    writeln!(self.output, "Goodbye!")?;
                    self.ctx.activity.info("User chose to exit the chatbot.");
                    return Ok(());
                }
            };
            match outcome {
                Ok(Step::Continue) => {}
                Ok(Step::Exit) => {
                    self.ctx.activity.info("Input closed; ending session.");
                    return Ok(());
                }
                Err(ActionError::Chat(err)) => self.report(&err)?,
                Err(ActionError::Io(err)) => return Err(err),
            }
        }
    }

    fn print_menu(&mut self) -> Result<()> {
        let query_label = if self.ctx.generator.is_some() {
            "Run an SQL query or ask the assistant to write one"
        } else {
            "Run an SQL query"
        };
        writeln!(self.output)?;
        writeln!(self.output, "Welcome to the SQLite chatbot! Please choose an option:")?;
        writeln!(self.output, "1. Load a CSV file")?;
        writeln!(self.output, "2. List all tables in the database")?;
        writeln!(self.output, "3. {query_label}")?;
        writeln!(self.output, "4. Exit")?;
        Ok(())
    }

    fn report(&mut self, err: &ChatError) -> Result<()> {
        self.ctx.activity.error(format!("{err:?}"));
        match err {
            ChatError::SchemaConflictUnresolved { table, resolution } => writeln!(
                self.output,
                "Ingestion into '{table}' cancelled ({resolution}); no changes were made."
            )?,
            other => writeln!(self.output, "Error: {other}")?,
        }
        Ok(())
    }

    fn ask(&mut self, prompt: &str) -> std::result::Result<Option<String>, ActionError> {
        Ok(prompt_line(&mut self.input, &mut self.output, prompt)?)
    }

    fn load_csv(&mut self) -> ActionResult {
        let Some(path) = self.ask("Enter the full path of the CSV file to load: ")? else {
            return Ok(Step::Exit);
        };
        let Some(table) = self.ask("Enter the name of the table to create: ")? else {
            return Ok(Step::Exit);
        };
        let mut request = IngestRequest::new(path, table);
        request.load = self.ctx.load.clone();
        request.scope = self.ctx.scope;

        let mut prompt = LinePrompt {
            input: &mut self.input,
            output: &mut self.output,
        };
        let report = ingest::ingest(&mut self.ctx.store, &request, &mut prompt)?;
        self.ctx.activity.info(format!(
            "CSV file {:?} loaded into table '{}' ({} row(s)).",
            request.path, report.table, report.rows
        ));
        writeln!(
            self.output,
            "Data inserted into table '{}' ({} row(s)).",
            report.table, report.rows
        )?;
        Ok(Step::Continue)
    }

    fn list_tables(&mut self) -> ActionResult {
        let tables = self.ctx.store.list_tables()?;
        writeln!(self.output, "Tables in the database:")?;
        if tables.is_empty() {
            writeln!(self.output, "No tables found.")?;
        }
        for name in &tables {
            writeln!(self.output, "- {name}")?;
        }
        self.ctx.activity.info("User listed tables in the database.");
        Ok(Step::Continue)
    }

    fn run_query(&mut self) -> ActionResult {
        let use_assistant = if self.ctx.generator.is_some() {
            let Some(mode) = self.ask("Enter 1 to type SQL yourself or 2 to ask the assistant: ")? else {
                return Ok(Step::Exit);
            };
            mode.trim() == "2"
        } else {
            false
        };

        let sql = if use_assistant {
            let Some(table) = self.ask("Enter the table name to query: ")? else {
                return Ok(Step::Exit);
            };
            let Some(request) = self.ask("Describe the query you want to run: ")? else {
                return Ok(Step::Exit);
            };
            let sql = generate_query(&*self.ctx, &table, &request)?;
            writeln!(self.output, "Generated SQL query:\n{sql}")?;
            sql
        } else {
            let Some(sql) = self.ask("Enter the SQL query to run: ")? else {
                return Ok(Step::Exit);
            };
            sql
        };

        let output = self.ctx.store.query(&sql)?;
        write_query_output(&mut self.output, &output)?;
        self.ctx.activity.info(format!("Executed SQL query: {sql}"));
        Ok(Step::Continue)
    }
}

/// Asks the configured generator for a statement against `table`, using the
/// stored column names as schema.
pub fn generate_query(ctx: &SessionContext, table: &str, request: &str) -> crate::error::Result<String> {
    let generator = ctx
        .generator
        .as_deref()
        .ok_or_else(|| ChatError::Generation("No assistant is configured".to_string()))?;
    let stored = ctx
        .store
        .stored_table(table)?
        .ok_or_else(|| ChatError::UnknownTable(table.to_string()))?;
    let columns = stored
        .columns
        .into_iter()
        .map(|column| column.name)
        .collect::<Vec<_>>();
    generator.generate_sql(&stored.name, &columns, request)
}

pub fn write_query_output<W: Write>(output: &mut W, result: &QueryOutput) -> std::io::Result<()> {
    if let Some(affected) = result.affected {
        writeln!(output, "Statement executed; {affected} row(s) changed.")
    } else if result.is_empty() {
        writeln!(output, "No data found.")
    } else {
        write!(output, "{}", table::render_table(&result.columns, &result.rows))
    }
}

enum ActionError {
    Chat(ChatError),
    Io(anyhow::Error),
}

impl From<ChatError> for ActionError {
    fn from(err: ChatError) -> Self {
        ActionError::Chat(err)
    }
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        ActionError::Io(err.into())
    }
}

impl From<anyhow::Error> for ActionError {
    fn from(err: anyhow::Error) -> Self {
        ActionError::Io(err)
    }
}

type ActionResult = std::result::Result<Step, ActionError>;

/// Reads one trimmed line after writing `prompt`; `None` at end of input.
fn prompt_line<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<Option<String>> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    let read = input.read_line(&mut line).context("Reading from input")?;
    if read == 0 {
        writeln!(output)?;
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Conflict prompt that asks on the session's terminal.
struct LinePrompt<'a, R, W> {
    input: &'a mut R,
    output: &'a mut W,
}

impl<R: BufRead, W: Write> LinePrompt<'_, R, W> {
    fn ask(&mut self, conflict: &SchemaConflict, candidate: &TableSchema) -> Result<Resolution> {
        let existing = &conflict.existing;
        if conflict.same_columns {
            writeln!(
                self.output,
                "Table '{}' already exists with the same columns.",
                existing.name
            )?;
        } else {
            writeln!(
                self.output,
                "Table '{}' already exists with different columns: {}",
                existing.name,
                existing
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.declared_type))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
        }
        writeln!(self.output, "1. Overwrite the existing table")?;
        writeln!(self.output, "2. Rename the new table")?;
        writeln!(self.output, "3. Skip loading this file")?;
        let Some(choice) = prompt_line(&mut *self.input, &mut *self.output, "Choose how to proceed: ")? else {
            return Ok(Resolution::Abort);
        };
        let Some(action) = ConflictAction::parse_choice(&choice) else {
            return Ok(Resolution::Abort);
        };
        let suffix = if action == ConflictAction::Rename {
            let prompt = format!(
                "Enter a suffix; the data will be stored in '{}_<suffix>': ",
                candidate.name()
            );
            prompt_line(&mut *self.input, &mut *self.output, &prompt)?
        } else {
            None
        };
        Ok(action.into_resolution(suffix.as_deref()))
    }
}

impl<R: BufRead, W: Write> ConflictPrompt for LinePrompt<'_, R, W> {
    fn choose(&mut self, conflict: &SchemaConflict, candidate: &TableSchema) -> Resolution {
        self.ask(conflict, candidate).unwrap_or_else(|err| {
            log::warn!("Conflict prompt failed: {err:#}");
            Resolution::Abort
        })
    }
}
