use serde::Serialize;
use tracing::info;

use crate::cmd::RemoteArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat, Record};

#[derive(Serialize)]
struct Closed {
    id: String,
    closed: bool,
}

impl Record for Closed {
    fn columns() -> &'static [&'static str] {
        &["id", "closed"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.id.clone(), self.closed.to_string()]
    }
}

pub fn run(args: RemoteArgs, format: OutputFormat) -> CliResult<i32> {
    let remote = args.open()?;
    remote.close().map_err(|err| peer_error("close failed", err))?;
    info!(file_id = %remote.file_id(), "remote file closed");
    print_record(
        &Closed {
            id: remote.file_id().to_string(),
            closed: true,
        },
        format,
    );
    Ok(SUCCESS)
}
