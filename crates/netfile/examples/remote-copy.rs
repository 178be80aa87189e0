//! Serve a scratch file for writing, fill it through a `RemoteFile`, then read
//! it back, all in one process.
//!
//! Run with:
//!   cargo run --example remote-copy --features peer

use std::io::{Read, Seek, SeekFrom, Write};

use netfile::handle::LocalFile;
use netfile::peer::{FileServer, RemoteFile, ServerConfig};
use netfile::wire::{random_shared_secret, FileId, DEFAULT_SECRET_BYTES};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join(format!("netfile-remote-copy-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("scratch.txt");

    let secret = random_shared_secret(DEFAULT_SECRET_BYTES);
    let server = FileServer::bind("127.0.0.1:0", ServerConfig::new(secret.as_str()))?;

    let id = FileId::random();
    server.serve_writer(id.clone(), LocalFile::create(&path)?, None)?;
    server.serve_reader(id.clone(), LocalFile::open(&path)?, None)?;
    eprintln!("Serving {} as {id} at {}", path.display(), server.base_url());

    let mut remote = RemoteFile::new(&server.base_url(), id, secret)?;
    remote.write_all(b"hello from the other side of an HTTP connection\n")?;
    remote.seek(SeekFrom::Start(6))?;
    remote.write_all(b"FROM")?;

    remote.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    remote.read_to_string(&mut contents)?;
    eprint!("Read back: {contents}");

    let info = remote.stat()?;
    eprintln!("Remote size: {} bytes", info.size);

    remote.close()?;
    drop(server);
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
