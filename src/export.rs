//! Delimited export of a transaction collection.
//!
//! One generator, two delimiters: comma for a downloadable `.csv`, tab for
//! pasting straight into a spreadsheet. Text fields are always quoted with
//! inner quotes doubled; the amount is written bare.

use crate::error::FintracksError;
use crate::prompts::CSV_HEADER;
use crate::transaction::Transaction;
use chrono::{NaiveDate, Utc};
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
}

impl Delimiter {
    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
        }
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render `transactions` as a header line plus one line per record.
///
/// Lines are joined with `\n`; there is no trailing newline.
pub fn to_delimited(transactions: &[Transaction], delimiter: Delimiter) -> String {
    let sep = delimiter.as_char().to_string();
    let mut lines = Vec::with_capacity(transactions.len() + 1);
    lines.push(CSV_HEADER.replace(',', &sep));

    for t in transactions {
        lines.push(
            [
                quote(&t.date),
                quote(&t.description),
                t.amount.to_string(),
                quote(&t.category),
                quote(&t.notes),
            ]
            .join(&sep),
        );
    }
    lines.join("\n")
}

/// `fintracks_{username}_{YYYY-MM-DD}.csv`
pub fn export_filename(username: &str, date: NaiveDate) -> String {
    format!("fintracks_{}_{}.csv", username, date.format("%Y-%m-%d"))
}

/// [`export_filename`] for today's date in UTC.
pub fn todays_export_filename(username: &str) -> String {
    export_filename(username, Utc::now().date_naive())
}

/// Write a comma-delimited export to `path` atomically.
pub fn write_csv(path: impl AsRef<Path>, transactions: &[Transaction]) -> Result<(), FintracksError> {
    write_delimited(path, transactions, Delimiter::Comma)
}

/// Write an export to `path` via a temp file in the same directory.
pub fn write_delimited(
    path: impl AsRef<Path>,
    transactions: &[Transaction],
    delimiter: Delimiter,
) -> Result<(), FintracksError> {
    let path = path.as_ref();
    let write_err = |source: std::io::Error| FintracksError::ExportWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(to_delimited(transactions, delimiter).as_bytes())
        .map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Exported {} transaction(s) to {}", transactions.len(), path.display());
    Ok(())
}
