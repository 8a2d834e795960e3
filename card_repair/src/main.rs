//! card-repair: repair and validate a PRS602 access-card table.
//!
//! The diagnostic log goes to stdout (or `--log-file`); operational
//! tracing goes to stderr, filtered by `RUST_LOG` (default `info`).

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use card_repair::config::RepairConfig;
use card_repair::{DiagnosticSink, PassKind, RepairSession, SqliteCardStore, WriterSink};

#[derive(Parser)]
#[command(name = "card-repair", version, about = "Repair and validate PRS602 access-card tables")]
struct Cli {
    /// SQLite database holding the ECCards table
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Create the card table if it is missing
    #[arg(long, global = true)]
    create: bool,

    /// Append the diagnostic log to this file instead of stdout
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run repair passes (all of them, in the default order, unless --pass is given)
    Run {
        #[arg(long = "pass", value_enum)]
        passes: Vec<PassKind>,

        /// Back the table up here before writing
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report invariant violations without writing
    Check,
    /// Write a backup of the table
    Backup {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Replace the table with a backup
    Restore { file: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => RepairConfig::load(path)?,
        None => RepairConfig::default(),
    };
    if cli.database.is_some() {
        config.database = cli.database;
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file;
    }
    config.create_schema |= cli.create;

    let database = config
        .database
        .clone()
        .context("no database given: use --database or set \"database\" in the config")?;
    let store = SqliteCardStore::open(&database)
        .with_context(|| format!("failed to open {}", database.display()))?;
    if config.create_schema {
        store.create_schema().context("failed to create card table")?;
    } else if !store.table_exists()? {
        bail!(
            "{} has no {} table; pass --create to create it",
            database.display(),
            card_repair::sqlite_store::TABLE
        );
    }

    let sink: Box<dyn DiagnosticSink> = match &config.log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Box::new(WriterSink::new(file))
        }
        None => Box::new(WriterSink::new(io::stdout())),
    };
    let mut session = RepairSession::new(store, sink);

    match cli.command {
        Command::Run {
            passes,
            backup_dir,
            json,
        } => {
            if !passes.is_empty() {
                config.passes = passes;
            }
            if let Some(dir) = backup_dir.or(config.backup_dir) {
                session = session.with_backup_dir(dir);
            }
            let report = session.run(&config.passes)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for line in report.summary_lines() {
                    eprintln!("{}", line);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            let violations = session.check()?;
            Ok(if violations.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Command::Backup { dir } => {
            let path = session.backup(&dir)?;
            eprintln!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Restore { file } => {
            session.restore(&file)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
