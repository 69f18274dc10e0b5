use std::io;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use brew_coach::app::App;
use brew_coach::cli::Args;
use brew_coach::config::BrewConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    // --data-dir decides where the config file is looked up, then wins over
    // whatever data_dir the file itself names.
    let data_dir = args.data_dir.clone().unwrap_or_else(|| PathBuf::from(".brew-coach"));
    let config_path = BrewConfig::resolve_path(args.config.as_deref(), &data_dir);
    let mut cfg = BrewConfig::load(&config_path)?;
    if let Some(dir) = args.data_dir.clone() {
        cfg.storage.data_dir = dir;
    }
    if let Some(kind) = args.backend {
        cfg.storage.backend = kind;
    }

    let mut app = App::from_config(&cfg)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = app.execute(args.command, &mut out) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}
