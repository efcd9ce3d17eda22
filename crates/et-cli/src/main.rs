use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use et_cli::commands::{clear, configure, flush, run, sessions, status};
use et_cli::{Cli, Commands, Config, settings_file_path};

/// Opens the session database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<et_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    et_db::Database::open(&config.database_path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries badge updates and command output.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();
    match &cli.command {
        Some(Commands::Run { flush_on_exit }) => {
            drop(stdout);
            let db = open_database(&config)?;
            run::run(db, &config, cli.config.clone(), *flush_on_exit)?;
        }
        Some(Commands::Status { json }) => {
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, &config.database_path, *json)?;
        }
        Some(Commands::Sessions { json }) => {
            let db = open_database(&config)?;
            sessions::run(&mut stdout, &db, *json)?;
        }
        Some(Commands::Clear { contact }) => {
            let mut db = open_database(&config)?;
            clear::run(&mut stdout, &mut db, contact)?;
        }
        Some(Commands::Flush) => {
            let db = open_database(&config)?;
            flush::run(&mut stdout, db, &config)?;
        }
        Some(Commands::Configure {
            endpoint,
            clear_endpoint,
            operator,
        }) => {
            let path = settings_file_path(cli.config.as_deref())
                .context("could not determine config directory")?;
            let update = configure::SettingsUpdate {
                endpoint: endpoint.as_deref(),
                clear_endpoint: *clear_endpoint,
                operator: operator.as_deref(),
            };
            configure::run(&mut stdout, &path, &update)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
