use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use kt_cli::commands::{export, ingest, keys, stats, status, total};
use kt_cli::{Cli, Commands, Config};
use kt_engine::Engine;

/// Load config, ensuring the database directory exists.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

fn open_engine(config: &Config) -> Result<Engine> {
    Engine::open(
        &config.database_path,
        &config.user_id,
        config.engine_config(),
    )
    .with_context(|| format!("failed to open {}", config.database_path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: tests may have installed a subscriber already.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(cli.config.as_deref())?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let now = Utc::now();

    match command {
        Commands::Ingest => {
            let engine = open_engine(&config)?;
            ingest::run(io::stdin().lock(), &mut out, &engine)?;
            engine.shutdown()?;
        }
        Commands::Total(args) => {
            total::run(&mut out, args, &open_engine(&config)?, now)?;
        }
        Commands::Keys(args) => keys::run(&mut out, args, &open_engine(&config)?, now)?,
        Commands::Stats(args) => {
            stats::run(&mut out, args, &open_engine(&config)?, &config, now)?;
        }
        Commands::Export(args) => {
            export::run(&mut out, args, &open_engine(&config)?, now)?;
        }
        Commands::Status => status::run(&mut out, &open_engine(&config)?, &config)?,
    }

    out.flush()?;
    Ok(())
}
