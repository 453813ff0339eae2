mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "mbimlink", version, about = "MBIM control session CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Use debug or trace for frame dumps.
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "MBIMLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_subcommand() {
        let cli = Cli::try_parse_from([
            "mbimlink",
            "raw",
            "/dev/cdc-wdm0",
            "--hex",
            "0300000010000000010000000a000000",
        ])
        .expect("raw args should parse");

        assert!(matches!(cli.command, Command::Raw(_)));
    }

    #[test]
    fn rejects_conflicting_frame_sources() {
        let err = Cli::try_parse_from([
            "mbimlink",
            "raw",
            "/dev/cdc-wdm0",
            "--hex",
            "00",
            "--file",
            "/tmp/frame.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_probe_subcommand() {
        let cli = Cli::try_parse_from(["mbimlink", "probe", "/dev/cdc-wdm0", "--format", "json"])
            .expect("probe args should parse");
        assert!(matches!(cli.command, Command::Probe(_)));
    }

    #[test]
    fn parses_global_log_flags() {
        let cli = Cli::try_parse_from([
            "mbimlink",
            "--log-level",
            "trace",
            "version",
        ])
        .expect("log flags should parse");
        assert!(matches!(cli.command, Command::Version(_)));
    }
}
