mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "kvlink", version, about = "memcached binary protocol over TLS")]
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
        default_value = "warn",
        env = "KVLINK_LOG_LEVEL",
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
    fn parses_get_subcommand() {
        let cli = Cli::try_parse_from([
            "kvlink",
            "get",
            "cache.local:11207",
            "user:42",
            "--ca-cert",
            "/etc/kvlink/ca.pem",
            "--timeout",
            "250ms",
        ])
        .expect("get args should parse");

        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.key, "user:42");
        assert_eq!(args.connect.addr, "cache.local:11207");
        assert_eq!(args.connect.tls.ca_cert.len(), 1);
        assert_eq!(args.connect.tls.timeout, "250ms");
    }

    #[test]
    fn parses_noop_with_count_and_global_flags() {
        let cli = Cli::try_parse_from([
            "kvlink",
            "noop",
            "localhost",
            "-n",
            "3",
            "--insecure",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("noop args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.log_level, LogLevel::Debug));
        let Command::Noop(args) = cli.command else {
            panic!("expected noop");
        };
        assert_eq!(args.count, 3);
        assert!(args.connect.tls.insecure);
    }

    #[test]
    fn get_requires_key() {
        let err = Cli::try_parse_from(["kvlink", "get", "localhost"])
            .expect_err("missing key should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_version_with_server() {
        let cli = Cli::try_parse_from(["kvlink", "version", "--server", "localhost:11207"])
            .expect("version args should parse");
        let Command::Version(args) = cli.command else {
            panic!("expected version");
        };
        assert_eq!(args.server.as_deref(), Some("localhost:11207"));
        assert!(!args.extended);
    }
}
