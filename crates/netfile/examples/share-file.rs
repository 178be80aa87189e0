//! Expose one file for reading until interrupted.
//!
//! Run with:
//!   cargo run --example share-file --features peer -- /etc/hostname
//!
//! Then fetch it with the printed secret:
//!   cargo run --features cli -- get http://127.0.0.1:7878 hostname \
//!     --secret <SECRET>

use std::path::PathBuf;

use netfile::handle::LocalFile;
use netfile::peer::{FileServer, ServerConfig};
use netfile::wire::{random_shared_secret, FileId, DEFAULT_SECRET_BYTES};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: share-file <FILE>")?;

    let secret = random_shared_secret(DEFAULT_SECRET_BYTES);
    let server = FileServer::bind("127.0.0.1:7878", ServerConfig::new(secret.as_str()))?;

    let id = path
        .file_name()
        .map(FileId::from_path)
        .unwrap_or_else(FileId::random);
    server.serve_reader(id.clone(), LocalFile::open(&path)?, None)?;

    eprintln!("Serving {} as {id}", path.display());
    eprintln!("Base URL: {}", server.base_url());
    eprintln!("Secret:   {secret}");

    // Workers run until the process exits.
    loop {
        std::thread::park();
    }
}
