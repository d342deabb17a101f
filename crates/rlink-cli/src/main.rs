use clap::Parser;
use tracing_subscriber::EnvFilter;

use rlink_cli::{run, Cli};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let report = run(&cli.command)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
