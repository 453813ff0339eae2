use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod probe;
pub mod raw;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one command session, sending a prebuilt command frame verbatim.
    Raw(RawArgs),
    /// Open a device and report its negotiated transfer capacity.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Raw(args) => raw::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RawArgs {
    /// Control device path (e.g. /dev/cdc-wdm0).
    pub device: PathBuf,
    /// Command frame as hex bytes (header included).
    #[arg(long, conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read the command frame from a binary file.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
    /// Reply deadline per request (e.g. 15s, 500ms).
    #[arg(long, default_value = "15s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Control device path (e.g. /dev/cdc-wdm0).
    pub device: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
