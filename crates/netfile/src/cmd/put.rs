use std::fs::File;
use std::time::Instant;

use tracing::debug;

use crate::cmd::get::Transfer;
use crate::cmd::{check_buffer, copy_buffer, PutArgs, DEFAULT_BUFFER};
use crate::exit::{io_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: PutArgs, format: OutputFormat) -> CliResult<i32> {
    let buffer = check_buffer(args.buffer.unwrap_or(DEFAULT_BUFFER))?;
    let mut remote = args.remote.open()?;
    let mut source = File::open(&args.file)
        .map_err(|err| io_error(&format!("failed opening {}", args.file.display()), err))?;
    let started = Instant::now();

    let bytes = if args.full {
        let len = source
            .metadata()
            .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?
            .len();
        remote
            .put_from(source)
            .map_err(|err| peer_error("upload failed", err))?;
        debug!(file_id = %remote.file_id(), bytes = len, "uploaded in one request");
        len
    } else {
        copy_buffer(&mut source, &mut remote, buffer)
            .map_err(|err| io_error("upload failed", err))?
    };

    print_record(
        &Transfer {
            id: remote.file_id().to_string(),
            direction: "upload",
            path: args.file.display().to_string(),
            bytes,
            elapsed_ms: started.elapsed().as_millis(),
        },
        format,
    );
    Ok(SUCCESS)
}
