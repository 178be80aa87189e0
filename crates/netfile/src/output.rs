use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A result row every output format can render.
pub trait Record: Serialize {
    /// Column labels, in cell order.
    fn columns() -> &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

/// Print `records`: one JSON object per line, one table, `key=value` lines,
/// or tab-separated cells.
pub fn print_records<T: Record>(records: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for record in records {
                println!(
                    "{}",
                    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(T::columns().iter().map(|c| c.to_uppercase()));
            for record in records {
                table.add_row(record.cells());
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                let line = T::columns()
                    .iter()
                    .zip(record.cells())
                    .map(|(column, cell)| format!("{}={cell}", column.replace(' ', "_")))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{line}");
            }
        }
        OutputFormat::Raw => {
            for record in records {
                println!("{}", record.cells().join("\t"));
            }
        }
    }
}

pub fn print_record<T: Record>(record: &T, format: OutputFormat) {
    print_records(std::slice::from_ref(record), format);
}

/// `1536` as `1.5 KiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
