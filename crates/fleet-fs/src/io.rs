//! Atomic I/O operations with file locking
//!
//! The shared root often lives on a cloud-synced folder, where partially
//! written files are visible to other machines. Every write therefore goes
//! through write-to-temp-then-rename under an advisory lock, and reads retry
//! briefly on transient errors the sync client can cause.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use backoff::ExponentialBackoff;
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers never observe a partial file.
/// The temp file lives in the same directory to guarantee the rename stays on
/// one filesystem.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;

    fs2::FileExt::unlock(&temp_file).map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Read text content from a file, retrying transient failures.
///
/// Sync clients briefly hold exclusive handles on files they are uploading;
/// those reads fail with sharing violations that clear within milliseconds.
pub fn read_text(path: &Path) -> Result<String> {
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(25),
        max_elapsed_time: Some(Duration::from_secs(2)),
        ..Default::default()
    };

    backoff::retry_notify(
        backoff,
        || {
            fs::read_to_string(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::PermissionDenied => backoff::Error::transient(e),
                _ => backoff::Error::permanent(e),
            })
        },
        |err, wait| {
            tracing::debug!(path = %path.display(), error = %err, ?wait, "retrying read");
        },
    )
    .map_err(|e| {
        let source = match e {
            backoff::Error::Permanent(e) => e,
            backoff::Error::Transient { err, .. } => err,
        };
        Error::io(path, source)
    })
}

/// Write text content to a file atomically.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_text(path)?;
    serde_json::from_str(&content).map_err(|e| Error::JsonParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize a value as pretty-printed JSON and write it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| Error::JsonParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_atomic(path, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/c.txt");
        write_atomic(&path, b"content").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.txt");
        write_atomic(&path, b"content").unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], "file.txt");
    }

    #[test]
    fn test_read_text_missing_file_is_permanent() {
        let temp = TempDir::new().unwrap();
        let result = read_text(&temp.path().join("missing.txt"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        count: u32,
    }

    #[test]
    fn test_json_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("payload.json");
        let payload = Payload {
            name: "m1".into(),
            count: 3,
        };

        write_json(&path, &payload).unwrap();
        let loaded: Payload = read_json(&path).unwrap();
        assert_eq!(loaded, payload);
    }

    #[test]
    fn test_read_json_invalid_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let result: Result<Payload> = read_json(&path);
        assert!(matches!(result, Err(Error::JsonParse { .. })));
    }
}
