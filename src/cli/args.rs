//! CLI argument definitions using clap.
//!
//! ## Commands
//!
//! - `extract`: Extract styles from the project and write them to the output directory
//! - `init`: Write a default `.styleslicerc.json`

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Arguments {
    /// Check if a command was provided, otherwise print help and return None.
    pub fn with_command_or_help(self) -> Option<Self> {
        if self.command.is_none() {
            Self::command().print_help().ok();
            None
        } else {
            Some(self)
        }
    }

    pub fn verbose(&self) -> bool {
        match &self.command {
            Some(Command::Extract(cmd)) => cmd.common.verbose,
            Some(Command::Init) | None => false,
        }
    }
}

/// Arguments shared by commands that read a project.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Project root; the config file is searched from here (defaults to the current directory)
    #[arg(long)]
    pub source_root: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct ExtractCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output directory (overrides config file)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print the evaluated bundle to stdout
    #[arg(long)]
    pub emit_slices: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract static styles into the output directory
    Extract(ExtractCommand),
    /// Initialize a new .styleslicerc.json configuration file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extract_flags() {
        let args = Arguments::parse_from([
            "styleslice",
            "extract",
            "--source-root",
            "web",
            "--out-dir",
            "build/styles",
            "--emit-slices",
            "-v",
        ]);
        let Some(Command::Extract(cmd)) = &args.command else {
            panic!("expected extract");
        };
        assert_eq!(cmd.common.source_root, Some(PathBuf::from("web")));
        assert_eq!(cmd.out_dir, Some(PathBuf::from("build/styles")));
        assert!(cmd.emit_slices);
        assert!(args.verbose());
    }

    #[test]
    fn test_init_takes_no_flags() {
        assert!(Arguments::try_parse_from(["styleslice", "init", "--out-dir", "x"]).is_err());
        assert!(!Arguments::parse_from(["styleslice", "init"]).verbose());
    }
}
