mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "textbridge", version, about = "Bridge message channels over text sockets")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
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
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "textbridge",
            "send",
            "/tmp/test.sock",
            "--channel",
            "x",
            "--json",
            "{\"hello\":1}",
            "--attach",
            "a=00",
            "--attach",
            "b=ff",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.channel, "x");
                assert_eq!(args.attach, vec!["a=00", "b=ff"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn channel_defaults_to_empty_id() {
        let cli = Cli::try_parse_from(["textbridge", "listen", "/tmp/test.sock", "--count", "2"])
            .expect("listen args should parse");
        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.channel, "");
                assert_eq!(args.count, Some(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "textbridge",
            "send",
            "/tmp/test.sock",
            "--json",
            "{\"x\":1}",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "textbridge",
            "version",
            "--format",
            "pretty",
            "--log-format",
            "json",
        ])
        .expect("global flags should parse after subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }
}
