//! `qat` entry point.

use std::error::Error;

use clap::Parser;
use qat::cli::{Cli, run};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli, &mut std::io::stdout().lock()) {
        let mut last = e.to_string();
        eprintln!("error: {last}");
        let mut source = e.source();
        while let Some(cause) = source {
            // Wrapping variants display their inner error verbatim.
            let text = cause.to_string();
            if text != last {
                eprintln!("  caused by: {text}");
            }
            last = text;
            source = cause.source();
        }
        std::process::exit(1);
    }
}
