mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "netfile", version, about = "Serve and use files over HTTP")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "NETFILE_LOG_LEVEL",
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
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "netfile",
            "serve",
            "127.0.0.1:0",
            "--read",
            "/tmp/a.bin",
            "--read",
            "/tmp/b.bin",
            "--write",
            "/tmp/c.bin",
            "--no-put",
            "--ttl",
            "30s",
        ])
        .expect("serve args should parse");

        let Command::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.read.len(), 2);
        assert_eq!(args.write.len(), 1);
        assert!(args.no_put);
        assert_eq!(args.ttl.as_deref(), Some("30s"));
    }

    #[test]
    fn parses_get_subcommand() {
        let cli = Cli::try_parse_from([
            "netfile",
            "--format",
            "json",
            "get",
            "http://127.0.0.1:8080/files",
            "report.csv",
            "-o",
            "/tmp/report.csv",
            "--secret",
            "s3cret",
            "--buffer",
            "13",
        ])
        .expect("get args should parse");

        let Command::Get(args) = cli.command else {
            panic!("expected get command");
        };
        assert_eq!(args.remote.id, "report.csv");
        assert_eq!(args.remote.secret.as_deref(), Some("s3cret"));
        assert_eq!(args.buffer, 13);
    }

    #[test]
    fn rejects_full_put_with_buffer() {
        let err = Cli::try_parse_from([
            "netfile",
            "put",
            "http://127.0.0.1:8080",
            "f",
            "/tmp/f.bin",
            "--full",
            "--buffer",
            "17",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_stat_subcommand() {
        let cli = Cli::try_parse_from([
            "netfile",
            "stat",
            "http://127.0.0.1:8080",
            "f",
            "--timeout",
            "3s",
        ])
        .expect("stat args should parse");
        assert!(matches!(cli.command, Command::Stat(_)));
    }
}
