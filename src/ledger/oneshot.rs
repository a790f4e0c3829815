use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{ensure, Context as _, Result};

use super::{filter_accounts, parse_register_rows, payees_from_register_csv, LedgerQuery};
use crate::import::clean_id;

/// Runs a fresh `ledger` process per query. Slower than the pipe but
/// immune to prompt-detection trouble.
pub struct OneshotLedger {
    ledger_file: PathBuf,
    payees: Option<HashMap<String, Vec<String>>>,
}

impl OneshotLedger {
    pub fn new(ledger_file: impl Into<PathBuf>) -> Self {
        OneshotLedger {
            ledger_file: ledger_file.into(),
            payees: None,
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("ledger")
            .arg("--args-only")
            .arg("-f")
            .arg(&self.ledger_file)
            .arg("csv")
            .args(args)
            .output()
            .context("cannot run ledger")?;
        ensure!(output.status.success(), "ledger exited with {}", output.status);
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl LedgerQuery for OneshotLedger {
    fn transaction_exists_by_tag(&mut self, key: &str, value: &str) -> bool {
        let query = format!("{}={}", key, clean_id(value));
        match self.run(&["-E", "meta", &query]) {
            Ok(body) => !parse_register_rows(&body).is_empty(),
            Err(err) => {
                log::error!("ledger tag query failed: {:#}", err);
                false
            }
        }
    }

    fn account_for_payee(&mut self, payee: &str, exclude: &str) -> Option<String> {
        if self.payees.is_none() {
            let payees = match self.run(&[]) {
                Ok(body) => payees_from_register_csv(&body),
                Err(err) => {
                    log::error!("cannot load payees from ledger: {:#}", err);
                    HashMap::new()
                }
            };
            self.payees = Some(payees);
        }
        let payees = self.payees.as_ref()?;
        filter_accounts(payees.get(payee)?, exclude)
    }
}

/// Parentheses open an expression in hledger's query language, so literal
/// ones in tag values and payees must be escaped.
fn escape_query(arg: &str) -> String {
    arg.replace('(', "\\(").replace(')', "\\)")
}

fn payees_from_hledger_csv(raw: &str) -> HashMap<String, Vec<String>> {
    let mut payees: HashMap<String, Vec<String>> = HashMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            log::warn!("unparseable hledger csv header: {}", err);
            return payees;
        }
    };
    let description = headers.iter().position(|name| name == "description");
    let account = headers.iter().position(|name| name == "account");
    let (description, account) = match (description, account) {
        (Some(description), Some(account)) => (description, account),
        _ => {
            log::warn!("hledger csv output has no description/account columns");
            return payees;
        }
    };
    for record in reader.records() {
        if let Ok(record) = record {
            if let (Some(payee), Some(acct)) = (record.get(description), record.get(account)) {
                payees
                    .entry(payee.to_string())
                    .or_default()
                    .push(acct.to_string());
            }
        }
    }
    payees
}

pub struct HLedger {
    ledger_file: PathBuf,
    payees: Option<HashMap<String, Vec<String>>>,
}

impl HLedger {
    pub fn new(ledger_file: impl Into<PathBuf>) -> Self {
        HLedger {
            ledger_file: ledger_file.into(),
            payees: None,
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("hledger")
            .arg("-f")
            .arg(&self.ledger_file)
            .args(args.iter().map(|arg| escape_query(arg)))
            .output()
            .context("cannot run hledger")?;
        ensure!(output.status.success(), "hledger exited with {}", output.status);
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl LedgerQuery for HLedger {
    fn transaction_exists_by_tag(&mut self, key: &str, value: &str) -> bool {
        let query = format!("tag:{}={}", key, clean_id(value));
        match self.run(&["reg", &query]) {
            Ok(body) => !body.trim().is_empty(),
            Err(err) => {
                log::error!("hledger tag query failed: {:#}", err);
                false
            }
        }
    }

    fn account_for_payee(&mut self, payee: &str, exclude: &str) -> Option<String> {
        if self.payees.is_none() {
            let payees = match self.run(&["reg", "-O", "csv"]) {
                Ok(body) => payees_from_hledger_csv(&body),
                Err(err) => {
                    log::error!("cannot load payees from hledger: {:#}", err);
                    HashMap::new()
                }
            };
            self.payees = Some(payees);
        }
        let payees = self.payees.as_ref()?;
        filter_accounts(payees.get(payee)?, exclude)
    }
}
