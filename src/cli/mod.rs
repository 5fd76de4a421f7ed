use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::ConfigLoader;
use crate::records::RecordStore;
use crate::storage;

pub mod commands;

use self::commands::{AddArgs, DeleteArgs, ListArgs, ReportArgs, SummariesArgs, SummaryArgs};

#[derive(Parser, Debug)]
#[command(
    name = "incident-desk",
    version,
    about = "Incident records and daily occurrence summaries for a police unit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over INCIDENT_DESK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over INCIDENT_DESK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Print incidents matching a search term and/or date range
    List(ListArgs),
    /// Print daily summaries matching a search term and/or date range
    Summaries(SummariesArgs),
    /// Register or update an incident from a JSON draft
    Add(AddArgs),
    /// Delete an incident after confirmation
    Delete(DeleteArgs),
    /// Record the occurrence counts for a day
    Summary(SummaryArgs),
    /// Print totals for incidents and daily summaries
    Report(ReportArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("INCIDENT_DESK_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("INCIDENT_DESK_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);

    // The TUI owns the terminal, so its logs go to a file.
    let log_file = matches!(command, Commands::Tui).then(|| paths.log_file());
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;
    let mut store =
        RecordStore::open(storage, config.reporter.clone()).context("loading records")?;

    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let mut app = App::new(config.clone(), store);
            commands::run_tui(&mut app)
        }
        Commands::List(args) => {
            print!("{}", commands::list_incidents(&store, &config, &args)?);
            Ok(())
        }
        Commands::Summaries(args) => {
            print!("{}", commands::list_summaries(&store, &args)?);
            Ok(())
        }
        Commands::Add(args) => commands::add_incident(&mut store, args),
        Commands::Delete(args) => commands::delete_incident(&mut store, args),
        Commands::Summary(args) => commands::record_summary(&mut store, args),
        Commands::Report(args) => {
            print!("{}", commands::report(&store, &args));
            Ok(())
        }
    }
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = fmt().with_env_filter(env_filter);
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                builder.with_ansi(false).with_writer(Mutex::new(file)).init();
            }
            None => builder.with_writer(std::io::stderr).init(),
        }
        Ok(())
    })
    .map(|_| ())
}
