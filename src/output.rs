use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::discover::ResultRecord;
use crate::error::Result;

/// Write `records` as a pretty-printed JSON array.
///
/// Nothing is written for an empty result; returns whether the file was
/// written.
pub fn write_results(records: &[ResultRecord], path: &Path) -> Result<bool> {
    if records.is_empty() {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(serde_json::to_string_pretty(records)?.as_bytes())?;
    Ok(true)
}

/// Human-readable numbered listing of `records`.
#[must_use]
pub fn format_summary(records: &[ResultRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            format!(
                "{}. {}\n   -> discovered_by: {}\n   -> context: {}\n",
                i + 1,
                record.url,
                record.discovered_by,
                truncate_text(&record.context, 200)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
