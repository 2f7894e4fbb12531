mod categorizer;
mod cli;
mod document;
mod error;
mod fetch;
mod fmt;
mod importer;
mod models;
mod normalizer;
#[cfg(feature = "pdf")]
mod pdf;
mod reports;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { cache_dir } => cli::init::run(cache_dir),
        Commands::Fetch { url, force } => cli::fetch::run(url, force),
        Commands::Report {
            file,
            strategy,
            max_distance,
            by_state,
            top,
            format,
            output,
        } => cli::report::run(file, &strategy, max_distance, by_state, top, &format, output),
        Commands::Events {
            file,
            strategy,
            max_distance,
            limit,
        } => cli::events::run(file, &strategy, max_distance, limit),
        Commands::States { file } => cli::states::run(file),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
