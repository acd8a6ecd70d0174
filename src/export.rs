//! CSV export of generated cards for Anki's import dialog.
//!
//! One row per card, no header line: Anki maps columns to note fields in
//! order. Fields are quoted per RFC 4180 only when they contain a comma, a
//! double quote or a line break.

use crate::error::AnkiForgeError;
use crate::output::CardRow;
use std::path::Path;
use tracing::info;

/// Render rows as CSV, `\n`-terminated.
pub fn to_csv(rows: &[CardRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let line = row
            .fields()
            .iter()
            .map(|f| quote_field(f))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write rows as CSV to `path`, atomically.
pub async fn write_csv(path: impl AsRef<Path>, rows: &[CardRow]) -> Result<(), AnkiForgeError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| AnkiForgeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    // Atomic write: write to temp, then rename
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, to_csv(rows)).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} cards to {}", rows.len(), path.display());
    Ok(())
}
