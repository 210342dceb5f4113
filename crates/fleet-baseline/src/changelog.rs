//! Append-only human-readable version history.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::Result;

const HEADER: &str = "# Baseline Changelog\n";

/// Append one entry for a freshly tagged version.
pub fn append_entry(path: &Path, tag: &str, message: &str, at: DateTime<Utc>) -> Result<()> {
    let mut content = if path.exists() {
        fleet_fs::read_text(path)?
    } else {
        HEADER.to_string()
    };

    if !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&format!(
        "\n## {tag} — {}\n\n{message}\n",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    fleet_fs::write_text(path, &content)?;
    Ok(())
}
