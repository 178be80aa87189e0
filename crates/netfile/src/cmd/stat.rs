use netfile_handle::FileInfo;
use serde::Serialize;

use crate::cmd::RemoteArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{human_size, print_record, OutputFormat, Record};

#[derive(Serialize)]
struct StatOutput {
    id: String,
    #[serde(flatten)]
    info: FileInfo,
}

impl Record for StatOutput {
    fn columns() -> &'static [&'static str] {
        &["id", "name", "size", "mode", "modified", "dir"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.info.name.clone(),
            human_size(self.info.size),
            format!("{:o}", self.info.mode),
            self.info.mod_time.to_string(),
            self.info.is_dir.to_string(),
        ]
    }
}

pub fn run(args: RemoteArgs, format: OutputFormat) -> CliResult<i32> {
    let remote = args.open()?;
    let info = remote.stat().map_err(|err| peer_error("stat failed", err))?;
    print_record(
        &StatOutput {
            id: remote.file_id().to_string(),
            info,
        },
        format,
    );
    Ok(SUCCESS)
}
