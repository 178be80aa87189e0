use std::fs::Metadata;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Immutable metadata snapshot of an exposed handle.
///
/// Serialized as the JSON body of a stat response:
/// ```text
/// {"name":"data.bin","size":137,"modtime":1700000000000000000,"mode":420,"isdir":false}
/// ```
/// `modtime` is nanoseconds since the Unix epoch (negative before it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Base name of the file.
    pub name: String,
    /// Length in bytes.
    pub size: u64,
    /// Modification time, nanoseconds since the Unix epoch.
    #[serde(rename = "modtime")]
    pub mod_time: i64,
    /// Permission bits.
    pub mode: u32,
    /// Whether the handle refers to a directory.
    #[serde(rename = "isdir")]
    pub is_dir: bool,
}

impl FileInfo {
    /// Build a snapshot from filesystem metadata.
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        let mod_time = metadata
            .modified()
            .map(system_time_to_nanos)
            .unwrap_or_default();

        Self {
            name: name.into(),
            size: metadata.len(),
            mod_time,
            mode: mode_bits(metadata),
            is_dir: metadata.is_dir(),
        }
    }

    /// Snapshot for an anonymous in-memory buffer of `size` bytes.
    pub fn anonymous(size: u64) -> Self {
        Self {
            name: String::new(),
            size,
            mod_time: 0,
            mode: 0o600,
            is_dir: false,
        }
    }

    /// Modification time as a `SystemTime`.
    pub fn modified(&self) -> SystemTime {
        let nanos = Duration::from_nanos(self.mod_time.unsigned_abs());
        if self.mod_time >= 0 {
            UNIX_EPOCH + nanos
        } else {
            UNIX_EPOCH - nanos
        }
    }
}

fn system_time_to_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}

#[cfg(unix)]
fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_field_names_match_wire_format() {
        let info = FileInfo {
            name: "data.bin".to_string(),
            size: 137,
            mod_time: 42,
            mode: 0o644,
            is_dir: false,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["name"], "data.bin");
        assert_eq!(value["size"], 137);
        assert_eq!(value["modtime"], 42);
        assert_eq!(value["mode"], 0o644);
        assert_eq!(value["isdir"], false);
    }

    #[test]
    fn from_metadata_reports_size_and_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[7u8; 31]).unwrap();
        let metadata = file.as_file().metadata().unwrap();

        let info = FileInfo::from_metadata("sample", &metadata);
        assert_eq!(info.name, "sample");
        assert_eq!(info.size, 31);
        assert!(!info.is_dir);
        assert!(info.mod_time > 0);
    }

    #[test]
    fn modified_handles_pre_epoch_times() {
        let mut info = FileInfo::anonymous(0);
        info.mod_time = -1_000_000_000;
        assert_eq!(info.modified(), UNIX_EPOCH - Duration::from_secs(1));
    }
}
