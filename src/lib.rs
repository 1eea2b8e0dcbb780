pub mod activity;
pub mod assistant;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod ingest;
pub mod io_utils;
pub mod schema;
pub mod session;
pub mod store;
pub mod table;

use std::{env, io, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    activity::ActivityLog,
    assistant::{OpenAiGenerator, SqlGenerator},
    cli::{Cli, Commands},
    config::{AssistantConfig, SessionConfig},
    conflict::FixedResolution,
    ingest::IngestRequest,
    session::SessionContext,
    store::Store,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(default_level: LevelFilter) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sqlite_chat", default_level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    // Keep the menu readable; diagnostics stay available through RUST_LOG.
    let default_level = match cli.command {
        Commands::Chat(_) => LevelFilter::Warn,
        _ => LevelFilter::Info,
    };
    init_logging(default_level);
    match &cli.command {
        Commands::Chat(args) => handle_chat(&cli.store, args),
        Commands::Ingest(args) => handle_ingest(&cli.store, args),
        Commands::Tables => handle_tables(&cli.store),
        Commands::Query(args) => handle_query(&cli.store, args),
        Commands::Schema(args) => handle_schema(args),
    }
}

fn handle_chat(store_args: &cli::StoreArgs, args: &cli::ChatArgs) -> Result<()> {
    let generator: Option<Box<dyn SqlGenerator>> = if args.assistant {
        let config = AssistantConfig::from_args(&args.llm)?;
        info!("Assistant enabled using model {}", config.model);
        Some(Box::new(OpenAiGenerator::new(config)?))
    } else {
        None
    };
    let config = SessionConfig::new(store_args, &args.csv, args.conflict_scope);
    let mut ctx = SessionContext::open(&config, generator)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let outcome = session::run_session(&mut ctx, stdin.lock(), stdout.lock());
    ctx.close()
        .with_context(|| format!("Closing database {:?}", config.db_path))?;
    outcome
}

fn handle_ingest(store_args: &cli::StoreArgs, args: &cli::IngestArgs) -> Result<()> {
    let mut activity = ActivityLog::open(&store_args.log_file)?;
    let mut store = Store::open(&store_args.db)
        .with_context(|| format!("Opening database {:?}", store_args.db))?;
    let mut request = IngestRequest::new(&args.input, &args.table);
    request.load = config::load_options(&args.csv);
    request.scope = args.conflict_scope;
    let resolution = args
        .on_conflict
        .map(|action| action.into_resolution(args.suffix.as_deref()));
    debug!("Conflict resolution preset: {resolution:?}");

    let outcome = ingest::ingest(&mut store, &request, &mut FixedResolution(resolution));
    let closed = store.close();
    match outcome {
        Ok(report) => {
            activity.info(format!(
                "CSV file {:?} loaded into table '{}' ({} row(s)).",
                args.input, report.table, report.rows
            ));
            println!(
                "Data inserted into table '{}' ({} row(s)).",
                report.table, report.rows
            );
        }
        Err(err) => {
            activity.error(format!("{err:?}"));
            return Err(err).with_context(|| format!("Ingesting {:?} into '{}'", args.input, args.table));
        }
    }
    closed.context("Closing database")?;
    Ok(())
}

fn handle_tables(store_args: &cli::StoreArgs) -> Result<()> {
    let store = Store::open(&store_args.db)
        .with_context(|| format!("Opening database {:?}", store_args.db))?;
    let tables = store.list_tables();
    store.close().context("Closing database")?;
    let tables = tables.context("Listing tables")?;
    if tables.is_empty() {
        println!("No tables found.");
    }
    for name in &tables {
        println!("{name}");
    }
    Ok(())
}

fn handle_query(store_args: &cli::StoreArgs, args: &cli::QueryArgs) -> Result<()> {
    let generator: Option<Box<dyn SqlGenerator>> = match &args.ask {
        Some(_) => Some(Box::new(OpenAiGenerator::new(AssistantConfig::from_args(
            &args.llm,
        )?)?)),
        None => None,
    };
    let config = SessionConfig::new(store_args, &cli::CsvArgs::default(), Default::default());
    let mut ctx = SessionContext::open(&config, generator)?;
    let outcome = run_query(&mut ctx, args);
    if let Err(err) = &outcome {
        ctx.activity.error(format!("{err:#}"));
    }
    ctx.close().context("Closing database")?;
    outcome
}

fn run_query(ctx: &mut SessionContext, args: &cli::QueryArgs) -> Result<()> {
    let sql = match (&args.sql, &args.ask, &args.table) {
        (Some(sql), _, _) => sql.clone(),
        (None, Some(request), Some(table)) => {
            let sql = session::generate_query(ctx, table, request)?;
            println!("Generated SQL query:\n{sql}");
            sql
        }
        _ => anyhow::bail!("Either --sql or --ask with --table is required"),
    };
    let output = ctx
        .store
        .query(&sql)
        .with_context(|| format!("Executing {sql:?}"))?;
    session::write_query_output(&mut io::stdout().lock(), &output)?;
    ctx.activity.info(format!("Executed SQL query: {sql}"));
    Ok(())
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    let options = config::load_options(&args.csv);
    let preview = ingest::preview_schema(&args.input, &args.table, &options)
        .with_context(|| format!("Inferring schema from {:?}", args.input))?;
    let schema = &preview.schema;
    let headers = vec![
        "#".to_string(),
        "column".to_string(),
        "detected".to_string(),
        "type".to_string(),
    ];
    let table_rows = schema
        .columns()
        .iter()
        .zip(&preview.detected)
        .enumerate()
        .map(|(idx, ((name, kind), detected))| {
            vec![
                (idx + 1).to_string(),
                name.clone(),
                detected.to_string(),
                kind.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &table_rows);
    println!();
    println!("{};", schema.create_statement());
    info!(
        "Inferred {} column(s) from {} row(s) of {:?}",
        schema.columns().len(),
        preview.rows,
        args.input
    );
    Ok(())
}
