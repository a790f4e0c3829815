//! Paypal ships two CSV layouts: the full activity export with per-leg
//! gross and net columns, and a reduced one with a single amount column.

use anyhow::{Context as _, Result};
use chrono::NaiveDate;

use super::{field, parse_decimal, render_payee, row_digest, CsvConverter, CsvOptions, CsvRow};
use crate::error::SyncError;
use crate::import::clean_id;
use crate::ir::{Amount, Posting, Transaction};

pub(super) const REQUIRED: &[&str] = &[
    "Currency",
    "Date",
    "Gross",
    "Item Title",
    "Name",
    "Net",
    "Status",
    "To Email Address",
    "Transaction ID",
    "Type",
];

pub(super) const ALTERNATE_REQUIRED: &[&str] = &["Date", "Name", "Type", "Status", "Amount"];

const DEFAULT_PAYEE: &str = "{Name} {To Email Address} {Item Title} ID: {Transaction ID}, {Type}";

const ALTERNATE_DEFAULT_PAYEE: &str = "{Name}: {Type}";

/// Funding rows move money between the bank and the Paypal balance, so
/// they post against a transfer account instead of an expense guess.
fn is_funding(txn_type: &str) -> bool {
    txn_type == "Add Funds from a Bank Account" || txn_type == "Charge From Debit Card"
}

#[derive(Debug)]
pub struct PaypalConverter {
    name: String,
    payee_format: String,
    unknown_account: Option<String>,
    date_format: Option<String>,
}

impl PaypalConverter {
    pub fn new(opts: &CsvOptions) -> Result<Self, SyncError> {
        let name = opts
            .name
            .clone()
            .ok_or(SyncError::MissingAccountName { format: "paypal" })?;
        Ok(PaypalConverter {
            name,
            payee_format: opts
                .payee_format
                .clone()
                .unwrap_or_else(|| DEFAULT_PAYEE.to_string()),
            unknown_account: opts.unknown_account.clone(),
            date_format: opts.date_format.clone(),
        })
    }
}

impl CsvConverter for PaypalConverter {
    fn row_id(&self, row: &CsvRow) -> String {
        format!("paypal.{}", clean_id(field(row, "Transaction ID")))
    }

    fn convert(&self, row: &CsvRow) -> Result<Option<Transaction>> {
        let status = field(row, "Status");
        let txn_type = field(row, "Type");
        // Pending rows show up again once they complete; cart items repeat
        // the enclosing payment line by line.
        if !matches!(status, "Completed" | "Refunded" | "Reversed")
            || txn_type == "Shopping Cart Item"
        {
            return Ok(None);
        }
        let currency = field(row, "Currency").to_string();
        let (amount_column, counter_account) = if is_funding(txn_type) {
            ("Net", "Transfer:Paypal".to_string())
        } else {
            (
                "Gross",
                self.unknown_account
                    .clone()
                    .unwrap_or_else(|| "Expenses:Misc".to_string()),
            )
        };
        let amount = parse_decimal(field(row, amount_column))?;
        let date = NaiveDate::parse_from_str(field(row, "Date"), "%m/%d/%Y")
            .with_context(|| format!("bad Paypal date: {:?}", field(row, "Date")))?;
        let payee = render_payee(&self.payee_format, row);
        let posting = Posting::new(self.name.clone(), Amount::new(amount, currency))
            .with_tag("csvid", self.row_id(row));
        let counter = posting.clone_inverted(counter_account);
        let mut txn = Transaction::new(date, payee, vec![posting, counter]);
        txn.date_format = self.date_format.clone();
        Ok(Some(txn))
    }
}

#[derive(Debug)]
pub struct PaypalAlternateConverter {
    name: String,
    payee_format: String,
    unknown_account: Option<String>,
    date_format: Option<String>,
}

impl PaypalAlternateConverter {
    pub fn new(opts: &CsvOptions) -> Result<Self, SyncError> {
        let name = opts
            .name
            .clone()
            .ok_or(SyncError::MissingAccountName { format: "paypal" })?;
        Ok(PaypalAlternateConverter {
            name,
            payee_format: opts
                .payee_format
                .clone()
                .unwrap_or_else(|| ALTERNATE_DEFAULT_PAYEE.to_string()),
            unknown_account: opts.unknown_account.clone(),
            date_format: opts.date_format.clone(),
        })
    }
}

impl CsvConverter for PaypalAlternateConverter {
    fn row_id(&self, row: &CsvRow) -> String {
        row_digest(row)
    }

    fn convert(&self, row: &CsvRow) -> Result<Option<Transaction>> {
        if field(row, "Status") != "Completed" {
            return Ok(None);
        }
        let currency = match field(row, "Currency") {
            "" => "$".to_string(),
            other => other.to_string(),
        };
        let amount = parse_decimal(&field(row, "Amount").replace(',', ""))?;
        let date = NaiveDate::parse_from_str(field(row, "Date"), "%m/%d/%Y")
            .with_context(|| format!("bad Paypal date: {:?}", field(row, "Date")))?;
        let txn_type = field(row, "Type");
        let counter_account = if is_funding(txn_type) {
            "Transfer:Paypal".to_string()
        } else {
            self.unknown_account
                .clone()
                .unwrap_or_else(|| "Expenses:Misc".to_string())
        };
        let payee = render_payee(&self.payee_format, row);
        let posting = Posting::new(self.name.clone(), Amount::new(amount, currency))
            .with_tag("csvid", self.row_id(row));
        let counter = posting.clone_inverted(counter_account);
        let mut txn = Transaction::new(date, payee, vec![posting, counter]);
        txn.date_format = self.date_format.clone();
        Ok(Some(txn))
    }
}
