//! CSV export support. Each bank or service gets its own converter; the
//! right one is picked by matching the file's header row against the
//! columns the converter needs.

pub mod amazon;
pub mod mint;
pub mod paypal;

pub use amazon::AmazonConverter;
pub use mint::MintConverter;
pub use paypal::{PaypalAlternateConverter, PaypalConverter};

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr as _;

use anyhow::{Context as _, Result};
use rust_decimal::Decimal;
use sha2::{Digest as _, Sha256};

use crate::error::SyncError;
use crate::import::render_template;
use crate::ir::Transaction;

/// One record keyed by column name.
pub type CsvRow = HashMap<String, String>;

pub trait CsvConverter: std::fmt::Debug {
    /// Stable identifier for the csvid dedup tag.
    fn row_id(&self, row: &CsvRow) -> String;

    /// `None` means the row is informational and produces no entry.
    fn convert(&self, row: &CsvRow) -> Result<Option<Transaction>>;
}

/// Converter settings shared by every CSV format.
#[derive(Debug, Default)]
pub struct CsvOptions {
    /// Ledger account the rows belong to. Some formats cannot run without
    /// it, Mint falls back to the file's own account column.
    pub name: Option<String>,
    pub unknown_account: Option<String>,
    /// Payee template substituting `{Column Name}` fields. Each format has
    /// its own default.
    pub payee_format: Option<String>,
    pub date_format: Option<String>,
}

/// Expands a payee template over the row's columns and collapses the
/// whitespace runs that empty optional fields leave behind.
pub(super) fn render_payee(template: &str, row: &CsvRow) -> String {
    collapse_whitespace(&render_template(template, |field| row.get(field).cloned()))
}

/// Content digest of a whole row, for formats without a usable native id.
/// Key=value lines are sorted first so column order never changes the id.
pub fn row_digest(row: &CsvRow) -> String {
    let mut lines: Vec<String> = row
        .iter()
        .map(|(key, value)| format!("{}={}\n", key, value))
        .collect();
    lines.sort();
    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
    }
    hex::encode(&hasher.finalize()[..16])
}

/// Picks the converter whose required columns all appear in the header row.
/// Extra columns are fine. Formats are tried most-specific first.
pub fn build_converter(
    path: &Path,
    headers: &[String],
    opts: &CsvOptions,
) -> Result<Box<dyn CsvConverter>, SyncError> {
    let observed: HashSet<&str> = headers.iter().map(String::as_str).collect();
    let has = |required: &[&str]| required.iter().all(|column| observed.contains(column));
    if has(paypal::REQUIRED) {
        Ok(Box::new(PaypalConverter::new(opts)?))
    } else if has(paypal::ALTERNATE_REQUIRED) {
        Ok(Box::new(PaypalAlternateConverter::new(opts)?))
    } else if has(amazon::REQUIRED) {
        Ok(Box::new(AmazonConverter::new(opts)?))
    } else if has(mint::REQUIRED) {
        Ok(Box::new(MintConverter::new(opts)))
    } else {
        Err(SyncError::UnknownCsvFormat {
            path: path.to_path_buf(),
            columns: headers.join(", "),
        })
    }
}

/// Reads a whole CSV file into header names and name-keyed rows. Cell
/// whitespace is trimmed, matching what the exports actually contain.
pub fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<CsvRow>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot open CSV file {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("cannot read CSV header row from {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("malformed CSV record in {}", path.display()))?;
        rows.push(
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        );
    }
    Ok((headers, rows))
}

fn field<'a>(row: &'a CsvRow, key: &str) -> &'a str {
    row.get(key).map(String::as_str).unwrap_or("")
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("bad amount in CSV row: {:?}", raw))
}
