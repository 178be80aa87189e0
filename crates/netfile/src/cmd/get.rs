use std::fs::File;
use std::io::{self, BufWriter};
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::cmd::{check_buffer, copy_buffer, GetArgs};
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::{human_size, print_record, OutputFormat, Record};

/// Summary of a completed copy.
#[derive(Serialize)]
pub struct Transfer {
    pub id: String,
    pub direction: &'static str,
    pub path: String,
    pub bytes: u64,
    pub elapsed_ms: u128,
}

impl Record for Transfer {
    fn columns() -> &'static [&'static str] {
        &["id", "direction", "path", "bytes", "size", "elapsed ms"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.direction.to_string(),
            self.path.clone(),
            self.bytes.to_string(),
            human_size(self.bytes),
            self.elapsed_ms.to_string(),
        ]
    }
}

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let buffer = check_buffer(args.buffer)?;
    let mut remote = args.remote.open()?;
    let started = Instant::now();

    let Some(path) = &args.output else {
        // Content goes to stdout, so no summary is printed.
        let mut out = io::stdout().lock();
        let bytes = copy_buffer(&mut remote, &mut out, buffer)
            .map_err(|err| io_error("download failed", err))?;
        debug!(file_id = %remote.file_id(), bytes, "downloaded to stdout");
        return Ok(SUCCESS);
    };

    let file = File::create(path)
        .map_err(|err| io_error(&format!("failed creating {}", path.display()), err))?;
    let mut out = BufWriter::new(file);
    let bytes = copy_buffer(&mut remote, &mut out, buffer)
        .map_err(|err| io_error("download failed", err))?;

    print_record(
        &Transfer {
            id: remote.file_id().to_string(),
            direction: "download",
            path: path.display().to_string(),
            bytes,
            elapsed_ms: started.elapsed().as_millis(),
        },
        format,
    );
    Ok(SUCCESS)
}
