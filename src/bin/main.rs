//! Tablesmith CLI - compile and run table specs
//!
//! Usage:
//!   tablesmith compile <spec.yaml> --schema <schema.json> [--format text|json]
//!   tablesmith run <spec.yaml> --data <data.json>
//!
//! Examples:
//!   tablesmith compile staff.yaml --schema schema.json
//!   tablesmith run staff.yaml --data tables.json -v
//!
//! A schema file maps table names to column lists:
//!   {"employee": ["employee_id", "name"], "department": ["department_id", "name"]}
//!
//! A data file maps table names to `{columns, rows}`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tablesmith::compile::{compile_with_options, CompileOptions};
use tablesmith::config::Settings;
use tablesmith::executor::{execute, EngineSchemas, MemoryEngine, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tablesmith")]
#[command(about = "Tablesmith - compile declarative table specs into query plans")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $TABLESMITH_CONFIG or ./tablesmith.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a spec and print its plan
    Compile {
        /// Path to the spec file
        spec: PathBuf,

        /// JSON file mapping table names to column lists
        #[arg(short, long)]
        schema: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Compile a spec and run it over in-memory tables
    Run {
        /// Path to the spec file
        spec: PathBuf,

        /// JSON file mapping table names to {columns, rows}
        #[arg(short, long)]
        data: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Plan rendered as text
    Text,
    /// Plan as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from '{}'", path.display()))?,
        None => Settings::load().context("loading settings")?,
    };
    init_logging(cli.verbose, settings.log.filter.as_deref());

    let options = settings.compile_options()?;
    debug!(default_join_type = %options.default_join_type, "settings loaded");

    match cli.command {
        Commands::Compile {
            spec,
            schema,
            format,
        } => cmd_compile(&spec, &schema, format, &options),
        Commands::Run { spec, data } => cmd_run(&spec, &data, &options),
    }
}

fn init_logging(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("tablesmith=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("warn")))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))
}

fn cmd_compile(
    spec: &Path,
    schema: &Path,
    format: OutputFormat,
    options: &CompileOptions,
) -> Result<()> {
    let source = read(spec)?;
    let schemas: BTreeMap<String, Vec<String>> = serde_json::from_str(&read(schema)?)
        .with_context(|| format!("parsing schema file '{}'", schema.display()))?;

    let plan = compile_with_options(&source, &schemas, options)
        .with_context(|| format!("compiling '{}'", spec.display()))?;

    match format {
        OutputFormat::Text => print!("{}", plan.explain()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

fn cmd_run(spec: &Path, data: &Path, options: &CompileOptions) -> Result<()> {
    let source = read(spec)?;
    let tables = Table::load_json(&read(data)?)
        .with_context(|| format!("loading data file '{}'", data.display()))?;
    let datasets: HashMap<String, Arc<Table>> = tables
        .into_iter()
        .map(|(name, table)| (name, Arc::new(table)))
        .collect();

    let engine = MemoryEngine::new();
    let plan = compile_with_options(&source, &EngineSchemas::new(&engine, &datasets), options)
        .with_context(|| format!("compiling '{}'", spec.display()))?;
    let result = execute(&engine, &plan, &datasets)?;

    println!("{} ({} rows)", result.name, result.handle.rows.len());
    print!("{}", result.handle.render());
    Ok(())
}
