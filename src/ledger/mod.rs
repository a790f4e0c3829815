//! Query interface over an existing ledger journal, used to decide whether
//! a transaction was already recorded and to guess counter accounts from
//! payee history. Backed by a live `ledger` process, one-shot `ledger` or
//! `hledger` invocations, or an in-process journal parser.

pub mod journal;
pub mod oneshot;
pub mod pipe;

pub use journal::JournalReader;
pub use oneshot::{HLedger, OneshotLedger};
pub use pipe::PipedLedger;

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use anyhow::Result;

use crate::error::SyncError;

pub trait LedgerQuery {
    /// True when any transaction in the journal carries `; key: value`.
    /// The value is sanitized the same way ids are written, so callers can
    /// pass raw ids.
    fn transaction_exists_by_tag(&mut self, key: &str, value: &str) -> bool;

    /// The account most recently posted under `payee`, skipping `exclude`
    /// (the account being imported into).
    fn account_for_payee(&mut self, payee: &str, exclude: &str) -> Option<String>;
}

/// Which backend to talk to. `Auto` probes in order and takes the first
/// one that responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Auto,
    Hledger,
    /// Fresh `ledger` process per query instead of a long-lived pipe.
    SlowLedger,
    /// The in-process journal parser, no external tools.
    Builtin,
}

fn ledger_available() -> bool {
    Command::new("ledger")
        .arg("--version")
        .output()
        .map(|out| {
            out.status.success() && String::from_utf8_lossy(&out.stdout).starts_with("Ledger 3")
        })
        .unwrap_or(false)
}

fn hledger_available() -> bool {
    Command::new("hledger")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Opens the requested backend, or probes piped ledger, hledger and the
/// built-in reader in that order for `Auto`. A forced backend that is not
/// usable is a hard error; query-time trouble later degrades per query.
pub fn open_ledger(choice: BackendChoice, ledger_file: &Path) -> Result<Box<dyn LedgerQuery>> {
    match choice {
        BackendChoice::Hledger => {
            if !hledger_available() {
                return Err(SyncError::NoLedgerBackend {
                    backend: "hledger",
                    reason: "hledger was not found on PATH".to_string(),
                }
                .into());
            }
            Ok(Box::new(HLedger::new(ledger_file)))
        }
        BackendChoice::SlowLedger => {
            if !ledger_available() {
                return Err(SyncError::NoLedgerBackend {
                    backend: "ledger",
                    reason: "ledger 3 was not found on PATH".to_string(),
                }
                .into());
            }
            Ok(Box::new(OneshotLedger::new(ledger_file)))
        }
        BackendChoice::Builtin => Ok(Box::new(JournalReader::open(ledger_file)?)),
        BackendChoice::Auto => {
            if ledger_available() {
                Ok(Box::new(PipedLedger::open(ledger_file)?))
            } else if hledger_available() {
                log::debug!("ledger 3 not found, using hledger");
                Ok(Box::new(HLedger::new(ledger_file)))
            } else {
                log::debug!("no ledger or hledger on PATH, reading the journal directly");
                Ok(Box::new(JournalReader::open(ledger_file)?))
            }
        }
    }
}

/// Ledger escapes its csv output with backslashes and quotes every field.
pub(crate) fn parse_register_rows(raw: &str) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .escape(Some(b'\\'))
        .from_reader(raw.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(err) => log::warn!("unparseable ledger csv row: {}", err),
        }
    }
    rows
}

/// Register csv row layout: date, code, payee, account, …
pub(crate) fn payees_from_register_csv(raw: &str) -> HashMap<String, Vec<String>> {
    let mut payees: HashMap<String, Vec<String>> = HashMap::new();
    for row in parse_register_rows(raw) {
        if let (Some(payee), Some(account)) = (row.get(2), row.get(3)) {
            payees.entry(payee.clone()).or_default().push(account.clone());
        }
    }
    payees
}

/// Most recent posting wins; the account being imported into never counts.
pub(crate) fn filter_accounts(accounts: &[String], exclude: &str) -> Option<String> {
    accounts
        .iter()
        .rev()
        .find(|account| account.as_str() != exclude)
        .cloned()
}
