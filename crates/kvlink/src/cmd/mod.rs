use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod get;
pub mod noop;
pub mod session;
pub mod version;

/// Port used when the address names only a host.
pub const DEFAULT_TLS_PORT: u16 = 11207;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send NOOP requests and print the responses.
    Noop(NoopArgs),
    /// Fetch one key.
    Get(GetArgs),
    /// Show version information, optionally the server's too.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Noop(args) => noop::run(args, format),
        Command::Get(args) => get::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug, Clone)]
pub struct TlsArgs {
    /// TLS server name, when it differs from the address host.
    #[arg(long, value_name = "NAME")]
    pub host: Option<String>,
    /// PEM file with trusted root certificates (repeatable).
    #[arg(long = "ca-cert", value_name = "FILE")]
    pub ca_cert: Vec<PathBuf>,
    /// Accept any server certificate.
    #[arg(long)]
    pub insecure: bool,
    /// Per-operation timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Server address (`host:port`, port defaults to 11207).
    pub addr: String,
    #[command(flatten)]
    pub tls: TlsArgs,
}

#[derive(Args, Debug)]
pub struct NoopArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Number of NOOP round trips on the same connection.
    #[arg(long, short = 'n', default_value = "1")]
    pub count: u32,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Key to fetch.
    pub key: String,
    /// vbucket id placed in the request header.
    #[arg(long, default_value = "0")]
    pub vbucket: u16,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
    /// Also ask this server for its version.
    #[arg(long, value_name = "ADDR")]
    pub server: Option<String>,
    #[command(flatten)]
    pub tls: TlsArgs,
}

/// Split `addr` into the TLS server name and a resolvable `host:port`.
pub fn split_address(addr: &str) -> CliResult<(String, String)> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(CliError::new(USAGE, "address must not be empty"));
    }

    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| CliError::new(USAGE, format!("unterminated IPv6 address: {addr}")))?;
        let endpoint = match tail.strip_prefix(':') {
            Some(port) => format!("[{host}]:{port}"),
            None if tail.is_empty() => format!("[{host}]:{DEFAULT_TLS_PORT}"),
            None => return Err(CliError::new(USAGE, format!("invalid address: {addr}"))),
        };
        return Ok((host.to_string(), endpoint));
    }

    match addr.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => {
            Ok((addr.to_string(), format!("[{addr}]:{DEFAULT_TLS_PORT}")))
        }
        Some((host, _)) => Ok((host.to_string(), addr.to_string())),
        None => Ok((addr.to_string(), format!("{addr}:{DEFAULT_TLS_PORT}"))),
    }
}

pub fn resolve(endpoint: &str) -> CliResult<SocketAddr> {
    endpoint
        .to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("cannot resolve {endpoint}: {err}")))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("{endpoint} resolved to no addresses")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
