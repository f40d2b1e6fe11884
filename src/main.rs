use std::io;
use std::process::ExitCode;
use std::thread;

use anyhow::anyhow;
use clap::Parser;
use styleslice::cli::{Arguments, ExitStatus};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "STYLESLICE_LOG";

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Stack for the extraction thread; the sandbox recurses per interpreted call.
const MAIN_STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() -> ExitCode {
    let args = Arguments::parse();
    init_tracing(args.verbose());

    let worker = thread::Builder::new()
        .name("styleslice".to_string())
        .stack_size(MAIN_STACK_SIZE)
        .spawn(move || styleslice::cli::run_cli(args));
    let result = match worker {
        Ok(handle) => handle.join().unwrap_or_else(|_| Err(anyhow!("extraction thread panicked"))),
        Err(err) => Err(anyhow!(err).context("Failed to start extraction thread")),
    };

    match result {
        Ok(status) => status.into(),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitStatus::Error.into()
        }
    }
}
