//! The Sable command-line interface.
//!
//! Parses arguments, installs the log subscriber, loads configuration and
//! dispatches to the [`crate::engine`] entry points. Any error is rendered
//! as a miette report on stderr and the process exits with status 1.

use std::process;

use clap::Parser;
use tracing::{debug, Level};

use crate::config::CompilerConfig;
use crate::engine;
use crate::errors::{print_error, SableError};

pub mod args;
pub mod output;

use args::{Command, SableArgs};

/// The main entry point for the CLI.
pub fn run() {
    let args = SableArgs::parse();
    init_logging(args.verbose);

    if let Err(e) = dispatch(&args) {
        print_error(e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(args: &SableArgs) -> Result<CompilerConfig, SableError> {
    match &args.config {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            CompilerConfig::from_yaml_file(path)
        }
        None => Ok(CompilerConfig::default()),
    }
}

fn dispatch(args: &SableArgs) -> Result<(), SableError> {
    let config = load_config(args)?;
    let file = args.command.file();
    debug!(command = ?args.command, "dispatching");

    match &args.command {
        Command::Read { .. } => {
            let text = engine::read_file(file)?;
            let data = engine::read_program(&text, &file.display().to_string())?;
            output::print_data(&data);
        }
        Command::Compile { .. } | Command::Expand { json: false, .. } => {
            output::print_fep(&engine::compile_file(file, config)?);
        }
        Command::Expand { json: true, .. } => {
            output::print_fep_json(&engine::compile_file(file, config)?)?;
        }
        Command::Trace { .. } => {
            let (_, trace) = engine::trace_file(file, config)?;
            output::print_trace(&trace);
        }
        Command::Run { .. } => {
            let (_, values) = engine::run_file(file, config)?;
            output::print_values(&values);
        }
    }
    Ok(())
}
