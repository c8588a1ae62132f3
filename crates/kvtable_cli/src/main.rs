//! kvtable CLI
//!
//! Command-line tools for databases persisted by the kvtable file engine.
//!
//! # Commands
//!
//! - `list` - List the databases in a directory
//! - `inspect` - Display containers, tables and row counts
//! - `count` - Count the rows of a table
//! - `head` / `tail` - Print the first or last rows of a table
//! - `get` - Print the row under one key
//! - `destroy` - Delete a database

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::rows::{self, Selection};
use commands::{Format, Target};
use kvtable_core::{Layout, DEFAULT_STORE_COUNT};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kvtable command-line database tools.
#[derive(Parser)]
#[command(name = "kvtable")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

/// Selects a database and the layout it was written with.
#[derive(Args)]
struct DatabaseArgs {
    /// Database name
    #[arg(short, long)]
    db: String,

    /// The database keeps one container per table
    #[arg(long, conflicts_with = "stores")]
    dedicated: bool,

    /// Size of the shared container pool
    #[arg(long, default_value_t = DEFAULT_STORE_COUNT)]
    stores: u32,
}

/// Selects a table.
#[derive(Args)]
struct TableArgs {
    #[command(flatten)]
    database: DatabaseArgs,

    /// Table name
    #[arg(short, long)]
    table: String,

    /// Key column of the table
    #[arg(short, long, default_value = "id")]
    key: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List the databases in the directory
    List,

    /// Display containers, tables and row counts
    Inspect {
        #[command(flatten)]
        database: DatabaseArgs,

        /// Group the rows of shared containers by table
        #[arg(long)]
        tables: bool,
    },

    /// Count the rows of a table
    Count {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Print the first rows of a table
    Head {
        #[command(flatten)]
        table: TableArgs,

        /// Number of rows
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u32,
    },

    /// Print the last rows of a table
    Tail {
        #[command(flatten)]
        table: TableArgs,

        /// Number of rows
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u32,
    },

    /// Print the row under one key
    Get {
        #[command(flatten)]
        table: TableArgs,

        /// Key value; digits are read as an integer key
        key: String,
    },

    /// Delete a database and its snapshot
    Destroy {
        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// Show version information
    Version,
}

fn target(path: Option<PathBuf>, args: DatabaseArgs) -> Result<Target, String> {
    let dir = path.ok_or("Snapshot directory required (--path)")?;
    let layout = if args.dedicated {
        Layout::Dedicated
    } else {
        Layout::Pooled {
            store_count: args.stores,
        }
    };
    Ok(Target {
        dir,
        database: args.db,
        layout,
    })
}

async fn read_rows(
    path: Option<PathBuf>,
    args: TableArgs,
    selection: Selection,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = target(path, args.database)?;
    let rows = rows::read(&target, &args.table, &args.key, &selection).await?;
    rows::print_rows(&rows, format, &mut io::stdout().lock())?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let format = cli.format;
    match cli.command {
        Commands::List => {
            let dir = cli.path.ok_or("Snapshot directory required (--path)")?;
            commands::list::run(&dir, format, &mut io::stdout().lock())?;
        }
        Commands::Inspect { database, tables } => {
            let target = target(cli.path, database)?;
            commands::inspect::run(&target, tables, format, &mut io::stdout().lock()).await?;
        }
        Commands::Count { table } => {
            let target = target(cli.path, table.database)?;
            let count = rows::count(&target, &table.table).await?;
            println!("{count}");
        }
        Commands::Head { table, limit } => {
            read_rows(cli.path, table, Selection::Head(limit), format).await?;
        }
        Commands::Tail { table, limit } => {
            read_rows(cli.path, table, Selection::Tail(limit), format).await?;
        }
        Commands::Get { table, key } => {
            let selection = Selection::Key(rows::parse_key(&key));
            read_rows(cli.path, table, selection, format).await?;
        }
        Commands::Destroy { database } => {
            let target = target(cli.path, database)?;
            commands::destroy::run(&target).await?;
        }
        Commands::Version => {
            println!("kvtable CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
