use std::fs::OpenOptions;
use std::path::Path;
use std::time::Duration;

use netfile_handle::LocalFile;
use netfile_peer::{CancelToken, FileServer, HandleKind, RemoteFile, ServerConfig};
use netfile_wire::{random_shared_secret, FileId, DEFAULT_SECRET_BYTES};
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::info;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{handle_error, peer_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_records, OutputFormat, Record};

/// How often the wait loop checks whether anything is left to serve.
const IDLE_CHECK: Duration = Duration::from_millis(200);

/// One exposed file, as printed at startup.
#[derive(Serialize)]
struct Exposure {
    id: String,
    kind: String,
    path: String,
    base_url: String,
    /// Single-request GET (readers) or PUT (writers) URL, secret included.
    direct_url: String,
    shared_secret: String,
}

impl Record for Exposure {
    fn columns() -> &'static [&'static str] {
        &["id", "kind", "path", "base url", "direct url"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.kind.clone(),
            self.path.clone(),
            self.base_url.clone(),
            self.direct_url.clone(),
        ]
    }
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.read.is_empty() && args.write.is_empty() {
        return Err(CliError::new(
            USAGE,
            "nothing to serve: pass --read or --write at least once",
        ));
    }
    let ttl = args.ttl.as_deref().map(parse_duration).transpose()?;
    let secret = args
        .secret
        .clone()
        .unwrap_or_else(|| random_shared_secret(DEFAULT_SECRET_BYTES));

    let config = ServerConfig::new(secret.as_str())
        .with_url_prefix(args.prefix.trim_end_matches('/'))
        .with_stat(!args.no_stat)
        .with_close(!args.no_close)
        .with_full_get(!args.no_full_get)
        .with_put(!args.no_put)
        .with_disclose_filenames(!args.hide_names)
        .with_workers(args.workers);
    let mut server =
        FileServer::bind(&args.addr, config).map_err(|err| peer_error("bind failed", err))?;

    let expiry = ttl.map(CancelToken::with_timeout);
    let client = Client::new();
    let mut exposures = Vec::with_capacity(args.read.len() + args.write.len());

    for path in &args.read {
        let id = file_id(path, args.random_ids);
        let file = LocalFile::open(path)
            .map_err(|err| handle_error(&format!("failed opening {}", path.display()), err))?;
        server
            .serve_reader(id.clone(), file, expiry.clone())
            .map_err(|err| peer_error("register failed", err))?;
        exposures.push(exposure(&server, &client, id, HandleKind::Reader, path, &secret)?);
    }

    for path in &args.write {
        let id = file_id(path, args.random_ids);
        let file = LocalFile::open_with(
            path,
            OpenOptions::new().read(true).write(true).create(true),
        )
        .map_err(|err| handle_error(&format!("failed opening {}", path.display()), err))?;
        server
            .serve_writer(id.clone(), file, expiry.clone())
            .map_err(|err| peer_error("register failed", err))?;
        exposures.push(exposure(&server, &client, id, HandleKind::Writer, path, &secret)?);
    }

    print_records(&exposures, format);

    let stop = CancelToken::new();
    install_ctrlc_handler(stop.clone())?;
    loop {
        if stop.wait_timeout(IDLE_CHECK).is_some() {
            info!("interrupted, shutting down");
            break;
        }
        if expiry.as_ref().is_some_and(CancelToken::is_cancelled) && server.registry().is_empty() {
            info!("every exposed file expired, shutting down");
            break;
        }
    }

    let closed = server.registry().close_all();
    server.shutdown();
    info!(closed, "server stopped");
    Ok(SUCCESS)
}

/// The file name, or a random identifier when asked for or when the path
/// has no usable name.
fn file_id(path: &Path, random: bool) -> FileId {
    if random {
        return FileId::random();
    }
    path.file_name()
        .map(FileId::from_path)
        .unwrap_or_else(FileId::random)
}

fn exposure(
    server: &FileServer,
    client: &Client,
    id: FileId,
    kind: HandleKind,
    path: &Path,
    secret: &str,
) -> CliResult<Exposure> {
    let base_url = server.base_url();
    let remote = RemoteFile::with_client(client.clone(), &base_url, id.clone(), secret)
        .map_err(|err| peer_error("invalid server url", err))?;
    let direct_url = match kind {
        HandleKind::Reader => remote.get_url(),
        HandleKind::Writer => remote.put_url(),
    };
    info!(file_id = %id, %kind, path = %path.display(), "exposed file");
    Ok(Exposure {
        id: id.to_string(),
        kind: kind.to_string(),
        path: path.display().to_string(),
        base_url,
        direct_url: direct_url.to_string(),
        shared_secret: secret.to_string(),
    })
}

fn install_ctrlc_handler(stop: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || stop.cancel()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn file_id_uses_the_file_name() {
        let id = file_id(&PathBuf::from("/var/data/report 1.csv"), false);
        assert_eq!(id.as_str(), "report%201.csv");
    }

    #[test]
    fn file_id_can_be_random() {
        let a = file_id(&PathBuf::from("/var/data/report.csv"), true);
        let b = file_id(&PathBuf::from("/var/data/report.csv"), true);
        assert_ne!(a, b);
    }
}
