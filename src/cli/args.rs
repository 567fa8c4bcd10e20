//! Command-line arguments and subcommands for the `sable` binary.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sable",
    version,
    about = "A macro-expanding module compiler for a Racket-family language."
)]
pub struct SableArgs {
    /// YAML compiler configuration.
    #[arg(long, global = true, value_name = "YAML")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every datum read from a file.
    Read {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Compile a module and print its fully-expanded program.
    Compile {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Like `compile`, optionally printing the program as JSON.
    Expand {
        #[arg(required = true)]
        file: PathBuf,
        /// Emit the typed program as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show each macro expansion step with colored diffs.
    Trace {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Compile, instantiate, and print the value of each top-level expression.
    Run {
        #[arg(required = true)]
        file: PathBuf,
    },
}

impl Command {
    pub fn file(&self) -> &PathBuf {
        match self {
            Command::Read { file }
            | Command::Compile { file }
            | Command::Expand { file, .. }
            | Command::Trace { file }
            | Command::Run { file } => file,
        }
    }
}
