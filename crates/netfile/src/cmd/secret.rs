use netfile_wire::{random_shared_secret, FileId};
use serde::Serialize;

use crate::cmd::SecretArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, OutputFormat, Record};

#[derive(Serialize)]
struct Generated {
    kind: &'static str,
    value: String,
}

impl Record for Generated {
    fn columns() -> &'static [&'static str] {
        &["kind", "value"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.kind.to_string(), self.value.clone()]
    }
}

pub fn run(args: SecretArgs, format: OutputFormat) -> CliResult<i32> {
    let generated = if args.id {
        Generated {
            kind: "file-id",
            value: FileId::random().to_string(),
        }
    } else {
        if args.bytes == 0 {
            return Err(CliError::new(USAGE, "--bytes must be greater than zero"));
        }
        Generated {
            kind: "shared-secret",
            value: random_shared_secret(args.bytes),
        }
    };

    // Raw output is the bare value so it can be captured by a shell.
    match format {
        OutputFormat::Raw => println!("{}", generated.value),
        _ => print_record(&generated, format),
    }
    Ok(SUCCESS)
}
