use anyhow::{bail, Context as _, Result};
use chrono::NaiveDate;

use super::{field, parse_decimal, render_payee, row_digest, CsvConverter, CsvOptions, CsvRow};
use crate::ir::{Amount, Posting, Transaction};

pub(super) const REQUIRED: &[&str] = &[
    "Date",
    "Description",
    "Original Description",
    "Amount",
    "Transaction Type",
    "Category",
    "Account Name",
    "Labels",
    "Notes",
];

const DEFAULT_PAYEE: &str = "{Description}";

/// Mint already categorizes every row, so the counter account comes from
/// the Category column instead of payee history.
#[derive(Debug)]
pub struct MintConverter {
    name: Option<String>,
    payee_format: String,
    date_format: Option<String>,
}

impl MintConverter {
    pub fn new(opts: &CsvOptions) -> Self {
        MintConverter {
            name: opts.name.clone(),
            payee_format: opts
                .payee_format
                .clone()
                .unwrap_or_else(|| DEFAULT_PAYEE.to_string()),
            date_format: opts.date_format.clone(),
        }
    }

    fn counter_account(category: &str) -> String {
        // These already are full account names in Mint's scheme.
        match category {
            "Transfer" | "Credit Card Payment" | "Transfer for Cash Spending" => {
                category.to_string()
            }
            _ => format!("Expenses:{}", category),
        }
    }
}

impl CsvConverter for MintConverter {
    fn row_id(&self, row: &CsvRow) -> String {
        format!("mint.{}", row_digest(row))
    }

    fn convert(&self, row: &CsvRow) -> Result<Option<Transaction>> {
        let amount = parse_decimal(&field(row, "Amount").replace(['$', ','], ""))?;
        let date = NaiveDate::parse_from_str(field(row, "Date"), "%m/%d/%Y")
            .with_context(|| format!("bad Mint date: {:?}", field(row, "Date")))?;
        let account = self
            .name
            .clone()
            .unwrap_or_else(|| field(row, "Account Name").to_string());
        let counter = Self::counter_account(field(row, "Category"));
        let postings = match field(row, "Transaction Type") {
            "debit" => vec![
                Posting::new(account, Amount::new(amount, "$"))
                    .with_tag("csvid", self.row_id(row)),
                Posting::new(counter, Amount::new(amount, "$").reversed()),
            ],
            "credit" => vec![
                Posting::new(account, Amount::new(amount, "$").reversed())
                    .with_tag("csvid", self.row_id(row)),
                Posting::new(counter, Amount::new(amount, "$")),
            ],
            other => bail!("unknown Mint transaction type: {:?}", other),
        };
        let mut txn = Transaction::new(date, render_payee(&self.payee_format, row), postings);
        txn.date_format = self.date_format.clone();
        Ok(Some(txn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint_row(cells: &[(&str, &str)]) -> CsvRow {
        let mut row: CsvRow = REQUIRED
            .iter()
            .map(|column| (column.to_string(), String::new()))
            .collect();
        for (key, value) in cells {
            row.insert(key.to_string(), value.to_string());
        }
        row
    }

    fn debit_row() -> CsvRow {
        mint_row(&[
            ("Date", "8/02/2016"),
            ("Description", "Amazon"),
            ("Original Description", "AMAZON MKTPLACE PMTS"),
            ("Amount", "29.99"),
            ("Transaction Type", "debit"),
            ("Category", "Shopping"),
            ("Account Name", "1234"),
        ])
    }

    #[test]
    fn debit_posts_against_the_category() {
        let converter = MintConverter::new(&CsvOptions::default());
        let expected = r#"2016/08/02 Amazon
    1234                                                   $29.99
    ; csvid: mint.f3c10dbe52a4653dd1d46f6ef488d2d0
    Expenses:Shopping                                     -$29.99
"#;
        assert_eq!(
            expected,
            converter.convert(&debit_row()).unwrap().unwrap().format(4)
        );
    }

    #[test]
    fn credit_reverses_both_legs() {
        let converter = MintConverter::new(&CsvOptions::default());
        let row = mint_row(&[
            ("Date", "6/02/2016"),
            ("Description", "Autopay Rautopay Auto"),
            ("Original Description", "AUTOPAY RAUTOPAY AUTOPYMT"),
            ("Amount", "123.45"),
            ("Transaction Type", "credit"),
            ("Category", "Credit Card Payment"),
            ("Account Name", "1234"),
        ]);
        let expected = r#"2016/06/02 Autopay Rautopay Auto
    1234                                                 -$123.45
    ; csvid: mint.f5b4fbdacdec6ca9841a8eb53b8b2f65
    Credit Card Payment                                   $123.45
"#;
        assert_eq!(expected, converter.convert(&row).unwrap().unwrap().format(4));
    }

    #[test]
    fn payee_format_substitutes_row_columns() {
        let opts = CsvOptions {
            payee_format: Some("{Original Description} ({Category})".to_string()),
            ..CsvOptions::default()
        };
        let converter = MintConverter::new(&opts);
        let txn = converter.convert(&debit_row()).unwrap().unwrap();
        assert_eq!("AMAZON MKTPLACE PMTS (Shopping)", txn.payee);
    }

    #[test]
    fn explicit_name_overrides_the_account_column() {
        let opts = CsvOptions {
            name: Some("Liabilities:Visa".to_string()),
            ..CsvOptions::default()
        };
        let converter = MintConverter::new(&opts);
        let txn = converter.convert(&debit_row()).unwrap().unwrap();
        assert_eq!("Liabilities:Visa", txn.postings[0].account);
    }

    #[test]
    fn transfer_category_is_used_verbatim() {
        assert_eq!("Transfer", MintConverter::counter_account("Transfer"));
        assert_eq!(
            "Expenses:Groceries",
            MintConverter::counter_account("Groceries")
        );
    }

    #[test]
    fn unknown_transaction_type_is_an_error() {
        let converter = MintConverter::new(&CsvOptions::default());
        let row = mint_row(&[
            ("Date", "8/02/2016"),
            ("Amount", "1.00"),
            ("Transaction Type", "hold"),
        ]);
        assert!(converter.convert(&row).is_err());
    }
}
