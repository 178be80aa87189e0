use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use netfile_peer::{ClientConfig, RemoteFile};
use netfile_wire::FileId;

use crate::exit::{peer_error, wire_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod close;
pub mod get;
pub mod put;
pub mod secret;
pub mod serve;
pub mod stat;
pub mod version;

/// Environment variable consulted when `--secret` is absent.
pub const SECRET_ENV: &str = "NETFILE_SHARED_SECRET";

/// Default copy buffer for `get` and `put`.
pub const DEFAULT_BUFFER: usize = 64 * 1024;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Expose local files over HTTP until interrupted.
    Serve(ServeArgs),
    /// Copy a remote file to a local file or stdout.
    Get(GetArgs),
    /// Copy a local file into a remote file.
    Put(PutArgs),
    /// Print metadata of a remote file.
    Stat(RemoteArgs),
    /// Ask the server to close a remote file.
    Close(RemoteArgs),
    /// Print a random shared secret or file identifier.
    Secret(SecretArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Get(args) => get::run(args, format),
        Command::Put(args) => put::run(args, format),
        Command::Stat(args) => stat::run(args, format),
        Command::Close(args) => close::run(args, format),
        Command::Secret(args) => secret::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (e.g. 127.0.0.1:8080, 0.0.0.0:0).
    pub addr: String,
    /// File to expose for reading (repeatable).
    #[arg(long, value_name = "FILE")]
    pub read: Vec<PathBuf>,
    /// File to expose for writing, created if missing (repeatable).
    #[arg(long, value_name = "FILE")]
    pub write: Vec<PathBuf>,
    /// Shared secret clients must present. Generated when absent.
    #[arg(long, env = SECRET_ENV, hide_env_values = true)]
    pub secret: Option<String>,
    /// Use random identifiers instead of file names.
    #[arg(long)]
    pub random_ids: bool,
    /// Withdraw every exposed file after this long (e.g. 30s, 5m).
    #[arg(long, value_name = "DURATION")]
    pub ttl: Option<String>,
    /// URL path prefix (e.g. /files).
    #[arg(long, value_name = "PREFIX", default_value = "")]
    pub prefix: String,
    /// Refuse stat requests.
    #[arg(long)]
    pub no_stat: bool,
    /// Refuse close requests.
    #[arg(long)]
    pub no_close: bool,
    /// Require the ranged protocol for reads.
    #[arg(long)]
    pub no_full_get: bool,
    /// Refuse whole-body uploads.
    #[arg(long)]
    pub no_put: bool,
    /// Report identifiers instead of file names on stat.
    #[arg(long)]
    pub hide_names: bool,
    /// Worker threads.
    #[arg(long, default_value_t = netfile_peer::DEFAULT_WORKERS)]
    pub workers: usize,
}

/// Where a remote file lives and how to authenticate.
#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Server base URL, including any prefix (e.g. http://host:8080/files).
    pub url: String,
    /// Identifier of the remote file.
    pub id: String,
    /// Shared secret.
    #[arg(long, env = SECRET_ENV, hide_env_values = true)]
    pub secret: Option<String>,
    /// Per-request timeout (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,
}

impl RemoteArgs {
    pub fn open(&self) -> CliResult<RemoteFile> {
        let secret = self.secret.clone().ok_or_else(|| {
            CliError::new(
                USAGE,
                format!("a shared secret is required: pass --secret or set {SECRET_ENV}"),
            )
        })?;
        let id = FileId::new(self.id.as_str()).map_err(|err| wire_error("invalid file id", err))?;
        let config = ClientConfig {
            timeout: self.timeout.as_deref().map(parse_duration).transpose()?,
            ..ClientConfig::default()
        };
        let file = RemoteFile::new(&self.url, id, secret)
            .map_err(|err| peer_error("invalid server", err))?;
        Ok(file.with_config(config))
    }
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
    /// Destination file. Default: stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Bytes requested per read.
    #[arg(long, default_value_t = DEFAULT_BUFFER)]
    pub buffer: usize,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
    /// Local file to upload.
    pub file: PathBuf,
    /// Send the whole file in one request instead of ranged chunks.
    #[arg(long, conflicts_with = "buffer")]
    pub full: bool,
    /// Bytes sent per ranged write.
    #[arg(long)]
    pub buffer: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SecretArgs {
    /// Bytes of entropy.
    #[arg(long, default_value_t = netfile_wire::DEFAULT_SECRET_BYTES, conflicts_with = "id")]
    pub bytes: usize,
    /// Print a random file identifier instead.
    #[arg(long)]
    pub id: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `30s`, `5m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
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
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn check_buffer(size: usize) -> CliResult<usize> {
    if size == 0 {
        return Err(CliError::new(USAGE, "buffer size must be greater than zero"));
    }
    Ok(size)
}

/// Copy through a buffer of exactly `size` bytes: one read, then one write of
/// whatever it returned, until the source reports end of file.
pub fn copy_buffer<R, W>(src: &mut R, dst: &mut W, size: usize) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; size];
    let mut total = 0u64;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        dst.write_all(&buf[..n])?;
        total += n as u64;
    }
    dst.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }

    #[test]
    fn copy_buffer_moves_everything() {
        let data: Vec<u8> = (0..=200u8).collect();
        let mut out = Vec::new();
        let n = copy_buffer(&mut data.as_slice(), &mut out, 17).unwrap();
        assert_eq!(n, 201);
        assert_eq!(out, data);
    }

    #[test]
    fn missing_secret_is_a_usage_error() {
        let args = RemoteArgs {
            url: "http://127.0.0.1:9".into(),
            id: "f".into(),
            secret: None,
            timeout: None,
        };
        let err = args.open().unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
