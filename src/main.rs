use clap::Parser;
use stackboard::cli::commands::Cli;
use stackboard::cli::handlers;
use tracing_subscriber::EnvFilter;

fn main() {
    // SB_LOG=debug for the store and sync logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("SB_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
