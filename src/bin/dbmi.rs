//! dbmi - DBMI command-line client
//!
//! Talks to a registered driver through the client library.
//!
//! # Usage
//!
//! ```bash
//! # Registered drivers
//! dbmi drivers
//!
//! # Tables of a database
//! dbmi --driver sqlite --database gis tables
//!
//! # Run a select
//! dbmi -d sqlite -b gis select "select * from rybniky" --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dbmi::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbmi")]
#[command(version)]
#[command(about = "Database management interface client", long_about = None)]
#[command(after_help = "EXAMPLES:
    dbmi drivers
    dbmi -d sqlite -b gis describe rybniky
    dbmi -d sqlite -b gis select \"select * from rybniky where kapri = 'hodne'\"")]
struct Cli {
    /// Driver name from the registry
    #[arg(short, long, env = "DBMI_DRIVER", global = true)]
    driver: Option<String>,

    /// Database to open
    #[arg(short = 'b', long, env = "DBMI_DATABASE", global = true)]
    database: Option<String>,

    /// Schema of the database
    #[arg(long, global = true)]
    schema: Option<String>,

    /// Driver registry (dbmscap) path
    #[arg(long, env = "DBMI_REGISTRY", global = true)]
    registry: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered drivers
    Drivers,
    /// List tables of the database
    Tables {
        /// Include system tables
        #[arg(long)]
        system: bool,
    },
    /// Show the columns of a table
    Describe {
        /// Table name
        table: String,
    },
    /// Run a SELECT and print the rows
    Select {
        /// SQL statement
        sql: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "dbmi=debug" } else { "dbmi=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = DbmiConfig::load()?;
    let registry_path = match &cli.registry {
        Some(path) => path.clone(),
        None => config.registry_path()?,
    };
    let registry = Registry::load(&registry_path)?;

    if let Commands::Drivers = cli.command {
        list_drivers(&registry, &cli.format)?;
        return Ok(());
    }

    let name = cli
        .driver
        .clone()
        .or_else(|| config.default_driver.clone())
        .context("no driver given; use --driver or set default_driver")?;
    let handle = match &cli.database {
        Some(db) => {
            let handle = Handle::new(db.clone());
            match cli.schema.clone().or_else(|| config.default_schema.clone()) {
                Some(schema) => handle.with_schema(schema),
                None => handle,
            }
        }
        None => config
            .default_handle()
            .context("no database given; use --database or set default_database")?,
    };

    let mut driver = Driver::start_with_registry(&registry, &name).await?;
    let result = run_with_driver(&mut driver, &handle, cli).await;
    // Always reap the driver, but report the first failure.
    let stopped = driver.shutdown().await;
    result?;
    stopped?;
    Ok(())
}

async fn run_with_driver(driver: &mut Driver, handle: &Handle, cli: &Cli) -> Result<()> {
    driver
        .open_database(handle)
        .await
        .with_context(|| format!("cannot open database {}", handle))?;

    match &cli.command {
        Commands::Drivers => {}
        Commands::Tables { system } => {
            let tables = driver.list_tables(*system).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tables)?),
                OutputFormat::Table => {
                    for table in &tables {
                        println!("{}", table);
                    }
                }
            }
        }
        Commands::Describe { table } => {
            let table = driver.describe_table(table).await?;
            describe(&table, &cli.format)?;
        }
        Commands::Select { sql } => {
            let mut cursor = driver
                .open_select_cursor(sql, CursorMode::SEQUENTIAL)
                .await?;
            let mut rows = Vec::new();
            while driver.fetch(&mut cursor, Position::Next).await? {
                rows.push(cursor.table()?.row());
            }
            let columns = cursor.table()?.columns().to_vec();
            driver.close_cursor(&mut cursor).await?;
            format_rows(&columns, &rows, &cli.format)?;
        }
    }

    driver.close_database().await?;
    Ok(())
}

fn list_drivers(registry: &Registry, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = registry
                .entries()
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "name": e.name,
                        "command": e.command_line(),
                        "comment": e.comment,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Table => {
            if registry.is_empty() {
                println!("{}", "(no drivers registered)".dimmed());
            }
            for entry in registry.entries() {
                println!(
                    "{} {} {}",
                    entry.name.cyan().bold(),
                    entry.command_line().white(),
                    entry.comment.dimmed()
                );
            }
        }
    }
    Ok(())
}

fn describe(table: &Table, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let columns: Vec<_> = table
                .columns()
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "name": c.name,
                        "type": c.sql_type.name(),
                        "length": c.length,
                        "nullable": c.null_allowed,
                    })
                })
                .collect();
            let doc = serde_json::json!({ "table": table.name, "columns": columns });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Table => {
            println!("{} {}", "Table:".dimmed(), table.name.white().bold());
            if !table.description.is_empty() {
                println!("{} {}", "Description:".dimmed(), table.description);
            }
            for column in table.columns() {
                let mut kind = column.sql_type.name().to_string();
                if column.length > 0 {
                    kind = format!("{}({})", kind, column.length);
                }
                let nullable = if column.null_allowed { "" } else { " NOT NULL" };
                println!("  {} {}{}", column.name.cyan(), kind, nullable.yellow());
            }
        }
    }
    Ok(())
}

fn value_to_json(value: &Value, sql_type: SqlType) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        other => serde_json::Value::String(other.to_text(sql_type)),
    }
}

fn value_to_cell(value: &Value, sql_type: SqlType) -> String {
    if value.is_null() {
        "NULL".to_string()
    } else {
        value.to_text(sql_type)
    }
}

fn format_rows(columns: &[Column], rows: &[Vec<Value>], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let objects: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let map: serde_json::Map<String, serde_json::Value> = columns
                        .iter()
                        .zip(row)
                        .map(|(c, v)| (c.name.clone(), value_to_json(v, c.sql_type)))
                        .collect();
                    serde_json::Value::Object(map)
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "(no results)".dimmed());
                return Ok(());
            }
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .zip(row)
                        .map(|(c, v)| value_to_cell(v, c.sql_type))
                        .collect()
                })
                .collect();
            let widths: Vec<usize> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    cells
                        .iter()
                        .map(|r| r[i].chars().count())
                        .max()
                        .unwrap_or(0)
                        .max(c.name.chars().count())
                })
                .collect();

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c.name, width = w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());
            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());
            for row in &cells {
                let line: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{:width$}", v, width = w))
                    .collect();
                println!("{}", line.join(" │ "));
            }
            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
    Ok(())
}
