//! Value types for the transactions we emit. These render ledger-cli text
//! directly, so the formatting rules here define the output format of the
//! whole tool.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// A commodity amount as it appears in a posting.
///
/// `reverse` flips the printed sign without touching the number, which is how
/// counter postings are produced. `unlimited` keeps the full precision of the
/// source data (security units, unit prices) instead of rounding to cents.
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Amount {
    pub number: Decimal,
    pub currency: String,
    pub reverse: bool,
    pub unlimited: bool,
}

impl Amount {
    pub fn new(number: Decimal, currency: impl Into<String>) -> Self {
        Amount {
            number,
            currency: currency.into(),
            reverse: false,
            unlimited: false,
        }
    }

    /// An amount rendered at full precision rather than rounded to cents.
    pub fn unlimited(number: Decimal, currency: impl Into<String>) -> Self {
        Amount {
            unlimited: true,
            ..Amount::new(number, currency)
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Commodities must be quoted in ledger if they contain whitespace or
        // numerals.
        let currency = if self
            .currency
            .chars()
            .any(|c| c.is_whitespace() || c.is_ascii_digit())
        {
            format!("\"{}\"", self.currency)
        } else {
            self.currency.clone()
        };
        let number = if self.unlimited {
            self.number.abs().to_string()
        } else {
            format!("{:.2}", self.number.abs())
        };
        let sign = if self.number.is_sign_negative() != self.reverse {
            "-"
        } else {
            ""
        };
        if currency.chars().count() == 1 {
            // $ comes before the number
            write!(f, "{}{}{}", sign, currency, number)
        } else {
            // USD comes after
            write!(f, "{}{} {}", sign, number, currency)
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Posting {
    pub account: String,
    pub amount: Amount,
    /// Balance assertion printed as `= amount` after the posting amount.
    pub asserted: Option<Amount>,
    /// Unit price printed as `@ amount`, used for security postings.
    pub unit_price: Option<Amount>,
    /// Tags printed as `; key: value` lines below the posting.
    pub metadata: BTreeMap<String, String>,
}

impl Posting {
    pub fn new(account: impl Into<String>, amount: Amount) -> Self {
        Posting {
            account: account.into(),
            amount,
            asserted: None,
            unit_price: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_assertion(mut self, amount: Amount) -> Self {
        self.asserted = Some(amount);
        self
    }

    pub fn with_unit_price(mut self, amount: Amount) -> Self {
        self.unit_price = Some(amount);
        self
    }

    /// The balancing counterpart of this posting: same amount with the sign
    /// flipped, no tags.
    pub fn clone_inverted(&self, account: impl Into<String>) -> Posting {
        Posting::new(account, self.amount.clone().reversed())
    }

    /// Render the posting with amounts right-aligned to column 65 where they
    /// fit.
    pub fn format(&self, indent: usize) -> String {
        let amount = self.amount.to_string();
        let pad = 65usize
            .saturating_sub(indent + self.account.chars().count() + amount.chars().count())
            .max(2);
        let mut out = format!(
            "{}{}{}{}",
            " ".repeat(indent),
            self.account,
            " ".repeat(pad),
            amount
        );
        if let Some(asserted) = &self.asserted {
            out.push_str(&format!(" = {}", asserted));
        }
        if let Some(price) = &self.unit_price {
            out.push_str(&format!(" @ {}", price));
        }
        out.push('\n');
        for (key, value) in &self.metadata {
            out.push_str(&format!("{}; {}: {}\n", " ".repeat(indent), key, value));
        }
        out
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Transaction {
    pub date: NaiveDate,
    /// Auxiliary date printed as `=date` after the main date, used for
    /// settlement dates that differ from the trade date.
    pub aux_date: Option<NaiveDate>,
    pub payee: String,
    pub cleared: bool,
    pub checknum: Option<String>,
    /// Tags printed as `; key: value` lines below the header.
    pub metadata: BTreeMap<String, String>,
    pub postings: Vec<Posting>,
    /// Overrides the default `%Y/%m/%d` date format.
    pub date_format: Option<String>,
}

impl Transaction {
    pub fn new(date: NaiveDate, payee: impl Into<String>, postings: Vec<Posting>) -> Self {
        Transaction {
            date,
            aux_date: None,
            payee: payee.into(),
            cleared: false,
            checknum: None,
            metadata: BTreeMap::new(),
            postings,
            date_format: None,
        }
    }

    pub fn format(&self, indent: usize) -> String {
        let date_format = self.date_format.as_deref().unwrap_or("%Y/%m/%d");
        let mut out = self.date.format(date_format).to_string();
        if let Some(aux) = self.aux_date {
            out.push_str(&format!("={}", aux.format(date_format)));
        }
        out.push_str(if self.cleared { " * " } else { " " });
        if let Some(checknum) = &self.checknum {
            out.push_str(&format!("({}) ", checknum));
        }
        out.push_str(&self.payee);
        out.push('\n');
        for (key, value) in &self.metadata {
            out.push_str(&format!("{}; {}: {}\n", " ".repeat(indent), key, value));
        }
        for posting in &self.postings {
            out.push_str(&posting.format(indent));
        }
        out
    }
}
