use anyhow::{Context as _, Result};
use chrono::NaiveDate;

use super::{field, parse_decimal, render_payee, CsvConverter, CsvOptions, CsvRow};
use crate::error::SyncError;
use crate::import::{clean_id, normalize_currency};
use crate::ir::{Amount, Posting, Transaction};

pub(super) const REQUIRED: &[&str] = &["Currency", "Title", "Order Date", "Order ID"];

const DEFAULT_PAYEE: &str = "{Title}";

/// Amazon order-history exports. Each row is one order line; the order id
/// doubles as a link back to the printable invoice.
#[derive(Debug)]
pub struct AmazonConverter {
    name: String,
    payee_format: String,
    unknown_account: Option<String>,
    date_format: Option<String>,
}

impl AmazonConverter {
    pub fn new(opts: &CsvOptions) -> Result<Self, SyncError> {
        let name = opts
            .name
            .clone()
            .ok_or(SyncError::MissingAccountName { format: "amazon" })?;
        Ok(AmazonConverter {
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

impl CsvConverter for AmazonConverter {
    fn row_id(&self, row: &CsvRow) -> String {
        format!("amazon.{}", clean_id(field(row, "Order ID")))
    }

    fn convert(&self, row: &CsvRow) -> Result<Option<Transaction>> {
        let currency = normalize_currency(field(row, "Currency"));
        let amount = parse_decimal(&field(row, "Item Total").replace(['$', ','], ""))?;
        let date = NaiveDate::parse_from_str(field(row, "Order Date"), "%m/%d/%y")
            .with_context(|| format!("bad Amazon order date: {:?}", field(row, "Order Date")))?;
        let url = format!(
            "https://www.amazon.com/gp/css/summary/print.html/ref=od_aui_print_invoice?ie=UTF8&orderID={}",
            field(row, "Order ID")
        );
        let posting = Posting::new(self.name.clone(), Amount::new(amount, currency))
            .with_tag("csvid", self.row_id(row))
            .with_tag("url", url);
        let counter = posting.clone_inverted(
            self.unknown_account
                .clone()
                .unwrap_or_else(|| "Expenses:Misc".to_string()),
        );
        let mut txn =
            Transaction::new(date, render_payee(&self.payee_format, row), vec![posting, counter]);
        txn.date_format = self.date_format.clone();
        Ok(Some(txn))
    }
}
