//! Data model for OFX statement downloads. Covers the subset of OFX 1.x
//! (SGML) and 2.x (XML) that banks actually put in checking, credit card and
//! investment statements.

mod parser;

pub use parser::{load, parse, parse_bytes};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct Ofx {
    pub institution: Option<Institution>,
    pub account: Option<Account>,
    pub securities: Vec<Security>,
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Institution {
    pub organization: String,
    pub fid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub account_id: String,
    pub statement: Statement,
}

#[derive(Debug, Clone, Default)]
pub struct Statement {
    /// CURDEF, as written in the file. Normalized later.
    pub currency: String,
    pub transactions: Vec<StatementTransaction>,
    pub positions: Vec<Position>,
    pub balance: Option<Decimal>,
    pub balance_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub enum StatementTransaction {
    Bank(BankTransaction),
    Investment(InvestmentTransaction),
}

impl StatementTransaction {
    pub fn id(&self) -> &str {
        match self {
            StatementTransaction::Bank(t) => &t.id,
            StatementTransaction::Investment(t) => &t.id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            StatementTransaction::Bank(t) => t.date,
            StatementTransaction::Investment(t) => t.trade_date,
        }
    }

    /// The posted amount for bank transactions. Investment transactions have
    /// no single amount, their value is derived from units and price.
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            StatementTransaction::Bank(t) => Some(t.amount),
            StatementTransaction::Investment(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct BankTransaction {
    /// FITID, unique per account per the OFX spec.
    pub id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    /// TRNTYPE, lowercased (`credit`, `debit`, `check`, ...).
    pub txn_type: String,
    pub payee: String,
    pub memo: String,
    pub checknum: Option<String>,
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct InvestmentTransaction {
    pub id: String,
    /// The OFX aggregate name, lowercased (`buystock`, `sellmf`, `income`,
    /// `reinvest`, `transfer`, ...).
    pub kind: String,
    pub trade_date: NaiveDate,
    pub settle_date: Option<NaiveDate>,
    pub memo: String,
    /// SECID/UNIQUEID, usually a CUSIP.
    pub security_id: String,
    /// INCOMETYPE for `income` and `reinvest` (`DIV`, `INTEREST`, ...).
    pub income_type: String,
    /// TFERACTION for `transfer`, lowercased (`in`, `out`).
    pub transfer_action: String,
    pub units: Decimal,
    pub unit_price: Decimal,
    pub fees: Decimal,
    pub commission: Decimal,
    /// TOTAL, the signed cash effect reported by the institution.
    pub total: Decimal,
}

/// A holding reported in an investment statement position list.
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Position {
    pub security_id: String,
    pub units: Decimal,
    pub unit_price: Decimal,
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Security {
    pub unique_id: String,
    pub ticker: Option<String>,
}
