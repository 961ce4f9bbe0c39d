//! jsonlitedb - command-line access to a JSON document store
//!
//! Inserts JSON/JSONL into a table and runs equality queries, index
//! maintenance and dumps against it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use jsonlite_core::{Config, Duplicates};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

pub const CLI_TABLE_ENV: &str = "JSONLITEDB_CLI_TABLE";

/// jsonlitedb - JSON documents in an SQLite file
#[derive(Parser, Debug)]
#[command(name = "jsonlitedb")]
#[command(version, about = "Insert, query and maintain JSON documents in an SQLite file")]
#[command(after_help = "Read-only commands: query, count, dump, indexes, stats\n\
                        Write commands: insert, import, add, delete, patch, create-index, drop-index")]
pub struct Cli {
    /// Table name
    #[arg(long, global = true, value_name = "NAME", env = CLI_TABLE_ENV,
          default_value = Config::DEFAULT_TABLE)]
    pub table: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert JSON into a database
    Insert(InsertArgs),
    /// Same as insert
    Import(InsertArgs),
    /// Add JSON items given on the command line
    Add(AddArgs),
    /// Query the database and emit JSONL
    #[command(after_help = "Examples:\n  \
        jsonlitedb query my.db name=George\n  \
        jsonlitedb query my.db '$.meta.rank=7' active=true --limit 5\n  \
        jsonlitedb query my.db --orderby=last --orderby=-born\n  \
        jsonlitedb query my.db --orderby=-meta,rank")]
    Query(QueryArgs),
    /// Count matching rows
    Count {
        dbpath: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Delete matching rows
    Delete {
        dbpath: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Allow a delete with no filters (deletes every row)
        #[arg(long)]
        allow_empty: bool,
    },
    /// Apply a JSON merge patch to matching rows. Keys set to null are removed.
    Patch {
        dbpath: PathBuf,
        /// JSON object patch, e.g. '{"active":true}'
        #[arg(long, value_name = "PATCH_OBJECT")]
        patch: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Dump the table as JSONL
    Dump {
        dbpath: PathBuf,
        /// Output file, '-' for stdout
        #[arg(long, default_value = "-")]
        output: String,
        #[arg(long = "file-mode", value_enum, default_value = "w")]
        mode: FileMode,
    },
    /// List indexes
    Indexes { dbpath: PathBuf },
    /// Show row, index and storage figures
    Stats { dbpath: PathBuf },
    /// Create an index over JSON paths
    CreateIndex {
        dbpath: PathBuf,
        /// key, $.json.path, or comma-separated nested keys (parent,child)
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(long)]
        unique: bool,
    },
    /// Drop indexes by name or by paths
    DropIndex {
        dbpath: PathBuf,
        /// key, $.json.path, or comma-separated nested keys (parent,child)
        paths: Vec<String>,
        /// Index name to drop; repeatable
        #[arg(long)]
        name: Vec<String>,
        /// Target the UNIQUE variant for path-based drops
        #[arg(long)]
        unique: bool,
    },
}

/// Input sources shared by insert, import and add. Flagged sources are
/// processed in command-line order.
#[derive(Args, Debug)]
pub struct InsertSources {
    /// How to handle UNIQUE conflicts. Without it, conflicts are errors.
    #[arg(long, value_enum)]
    pub duplicates: Option<DuplicatesArg>,

    pub dbpath: PathBuf,

    /// Read JSON or JSONL from stdin
    #[arg(long)]
    pub stdin: bool,

    /// JSON (whole file) or JSONL (line by line) input
    #[arg(long, value_name = "PATH")]
    pub file: Vec<String>,

    /// Single JSON item
    #[arg(long, value_name = "ITEM")]
    pub json: Vec<String>,

    #[arg(long, value_enum, default_value = "jsonlines")]
    pub stdin_format: StdinFormat,
}

#[derive(Args, Debug)]
pub struct InsertArgs {
    #[command(flatten)]
    pub sources: InsertSources,

    /// Input files, or '-' for stdin. Read after the flagged inputs.
    #[arg(value_name = "FILE_OR_DASH")]
    pub inputs: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[command(flatten)]
    pub sources: InsertSources,

    /// Same as repeating --json JSON_ITEM
    #[arg(value_name = "JSON_ITEM")]
    pub items: Vec<String>,
}

/// Equality filters, ANDed together.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// key=value pairs; values are parsed as JSON when possible
    pub filters: Vec<String>,

    /// JSON object expanded into key=value filters; repeatable
    #[arg(long, value_name = "OBJECT")]
    pub json: Vec<String>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    pub dbpath: PathBuf,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,

    #[arg(long, value_enum, default_value = "jsonl")]
    pub format: OutputFormat,

    /// Order by key or path; repeatable. Commas denote nested paths, a
    /// leading '-' sorts descending.
    #[arg(long)]
    pub orderby: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DuplicatesArg {
    Replace,
    Ignore,
}

impl From<DuplicatesArg> for Duplicates {
    fn from(arg: DuplicatesArg) -> Self {
        match arg {
            DuplicatesArg::Replace => Duplicates::Replace,
            DuplicatesArg::Ignore => Duplicates::Ignore,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StdinFormat {
    Json,
    Jsonlines,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Jsonl,
    Json,
    Count,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FileMode {
    #[value(name = "a")]
    Append,
    #[value(name = "w")]
    Write,
}

fn get_env_filter() -> EnvFilter {
    if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    } else {
        EnvFilter::new("warn")
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(get_env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match commands::run(cli, &matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
