//! Command-line interface: argument parsing, commands and reporting.

use std::path::Path;

use anyhow::Result;

mod args;
mod commands;
mod exit_status;
mod report;

pub use args::{Arguments, Command, CommonArgs, ExtractCommand};
pub use commands::{MANIFEST_FILE, STYLESHEET_FILE};
pub use exit_status::ExitStatus;

pub fn run_cli(args: Arguments) -> Result<ExitStatus> {
    let Some(args) = args.with_command_or_help() else {
        return Ok(ExitStatus::Success);
    };

    match args.command {
        Some(Command::Extract(cmd)) => commands::extract::extract(cmd),
        Some(Command::Init) => commands::init::init(Path::new(".")),
        None => Ok(ExitStatus::Success),
    }
}
