//! Converts OFX statement transactions into ledger transactions. Bank
//! transactions become a two-leg entry against an inferred expense account;
//! investment transactions get a security leg priced in the statement
//! currency plus whatever fee and income legs keep the entry balanced.

use std::collections::HashMap;

use anyhow::{Context as _, Result};
use rust_decimal::Decimal;

use crate::import::{normalize_currency, render_template, ConverterOptions, OfxIdBuilder};
use crate::ir::{Amount, Posting, Transaction};
use crate::ledger::LedgerQuery;
use crate::ofx::{
    BankTransaction, InvestmentTransaction, Ofx, Position, Statement, StatementTransaction,
};

/// Synthetic txnid for the generated starting-balance entry.
pub const AUTOSYNC_INITIAL: &str = "autosync_initial";
/// A journal tagged with this id opts out of initial balances for every
/// account at once.
pub const ALL_AUTOSYNC_INITIAL: &str = "all.autosync_initial";

pub struct OfxConverter<'a> {
    name: String,
    currency: String,
    ids: OfxIdBuilder,
    tickers: HashMap<String, String>,
    unknown_account: Option<String>,
    payee_format: Option<String>,
    date_format: Option<String>,
    ledger: Option<&'a mut (dyn LedgerQuery + 'static)>,
}

impl<'a> OfxConverter<'a> {
    pub fn new(
        ofx: &Ofx,
        name: impl Into<String>,
        ledger: Option<&'a mut (dyn LedgerQuery + 'static)>,
        opts: &ConverterOptions,
    ) -> Result<Self> {
        let account = ofx
            .account
            .as_ref()
            .context("OFX response has no account statement")?;
        let ids = OfxIdBuilder::from_ofx(
            ofx,
            &account.account_id,
            opts.fid.as_deref(),
            opts.redaction.as_ref(),
        )?;
        let tickers = ofx
            .securities
            .iter()
            .filter_map(|s| s.ticker.clone().map(|t| (s.unique_id.clone(), t)))
            .collect();
        Ok(OfxConverter {
            name: name.into(),
            currency: normalize_currency(&account.statement.currency),
            ids,
            tickers,
            unknown_account: opts.unknown_account.clone(),
            payee_format: opts.payee_format.clone(),
            date_format: opts.date_format.clone(),
            ledger,
        })
    }

    pub fn ofx_id(&self, txnid: &str) -> String {
        self.ids.build(txnid)
    }

    fn security_name(&self, unique_id: &str) -> String {
        self.tickers
            .get(unique_id)
            .cloned()
            .unwrap_or_else(|| unique_id.to_string())
    }

    pub fn format_payee(&self, txn: &StatementTransaction) -> String {
        match txn {
            StatementTransaction::Bank(t) => {
                self.build_payee(&t.payee, &t.memo, &t.txn_type, "")
            }
            StatementTransaction::Investment(t) => {
                self.build_payee("", &t.memo, &t.kind, &t.transfer_action)
            }
        }
    }

    /// Prefer whichever of payee and memo carries more information: banks
    /// truncate the payee field and then repeat it, extended, in the memo.
    fn build_payee(&self, payee: &str, memo: &str, txn_type: &str, tferaction: &str) -> String {
        if let Some(template) = &self.payee_format {
            return render_template(template, |field| match field {
                "payee" => Some(payee.to_string()),
                "memo" => Some(memo.to_string()),
                "account" => Some(self.name.clone()),
                "txntype" => Some(txn_type.to_string()),
                "tferaction" => Some(tferaction.to_string()),
                _ => None,
            });
        }
        if payee.is_empty() && memo.is_empty() {
            let mut fallback = format!("{}: {}", self.name, txn_type);
            if txn_type == "transfer" && !tferaction.is_empty() {
                fallback.push_str(": ");
                fallback.push_str(tferaction);
            }
            return fallback;
        }
        if payee.is_empty() || memo.starts_with(payee) {
            memo.to_string()
        } else if memo.is_empty() || payee.starts_with(memo) {
            payee.to_string()
        } else {
            format!("{} {}", payee, memo)
        }
    }

    fn dynamic_account(&mut self, payee: &str) -> String {
        if let Some(ledger) = self.ledger.as_deref_mut() {
            if let Some(account) = ledger.account_for_payee(payee, &self.name) {
                return account;
            }
        }
        self.unknown_account
            .clone()
            .unwrap_or_else(|| "Expenses:Misc".to_string())
    }

    pub fn convert(&mut self, txn: &StatementTransaction) -> Transaction {
        let ofxid = self.ids.build(txn.id());
        match txn {
            StatementTransaction::Bank(t) => self.convert_bank(t, ofxid),
            StatementTransaction::Investment(t) => self.convert_investment(t, ofxid),
        }
    }

    fn convert_bank(&mut self, txn: &BankTransaction, ofxid: String) -> Transaction {
        let payee = self.build_payee(&txn.payee, &txn.memo, &txn.txn_type, "");
        let counter_account = self.dynamic_account(&payee);
        let posting =
            Posting::new(self.name.clone(), Amount::new(txn.amount, self.currency.clone()))
                .with_tag("ofxid", ofxid);
        let counter = posting.clone_inverted(counter_account);
        let mut out = Transaction::new(txn.date, payee, vec![posting, counter]);
        out.checknum = txn.checknum.clone();
        out.date_format = self.date_format.clone();
        out
    }

    fn convert_investment(&mut self, txn: &InvestmentTransaction, ofxid: String) -> Transaction {
        if txn.kind == "income" {
            return self.convert_income(txn, ofxid);
        }
        let counter_account = if txn.kind.starts_with("buy") || txn.kind.starts_with("sell") {
            self.unknown_account
                .clone()
                .unwrap_or_else(|| "Assets:Unknown".to_string())
        } else if txn.kind == "transfer" {
            "Transfer".to_string()
        } else if txn.kind == "reinvest" {
            "Income:Interest".to_string()
        } else {
            self.name.clone()
        };
        let payee = self.build_payee("", &txn.memo, &txn.kind, &txn.transfer_action);
        // The cash leg absorbs fees and commission so the entry stays
        // balanced once the explicit fee legs are added.
        let cash = txn.units * txn.unit_price + txn.fees + txn.commission;
        let mut postings = vec![
            Posting::new(
                self.name.clone(),
                Amount::unlimited(txn.units, self.security_name(&txn.security_id)),
            )
            .with_unit_price(Amount::unlimited(txn.unit_price, self.currency.clone()))
            .with_tag("ofxid", ofxid),
            Posting::new(counter_account, Amount::new(cash, self.currency.clone()).reversed()),
        ];
        if !txn.fees.is_zero() {
            postings.push(Posting::new(
                "Expenses:Fees",
                Amount::new(txn.fees, self.currency.clone()),
            ));
        }
        if !txn.commission.is_zero() {
            postings.push(Posting::new(
                "Expenses:Commissions",
                Amount::new(txn.commission, self.currency.clone()),
            ));
        }
        let mut out = Transaction::new(txn.trade_date, payee, postings);
        if let Some(settle) = txn.settle_date {
            if settle != txn.trade_date {
                out.aux_date = Some(settle);
            }
        }
        out.date_format = self.date_format.clone();
        out
    }

    fn convert_income(&mut self, txn: &InvestmentTransaction, ofxid: String) -> Transaction {
        let payee = self.build_payee("", &txn.memo, &txn.kind, "");
        let posting = Posting::new(self.name.clone(), Amount::new(txn.total, self.currency.clone()))
            .with_tag("ofxid", ofxid);
        let mut out = if txn.income_type == "DIV" {
            let counter = posting.clone_inverted("Income:Dividends");
            let mut out = Transaction::new(txn.trade_date, payee, vec![posting, counter]);
            out.metadata.insert(
                "dividend_from".to_string(),
                self.security_name(&txn.security_id),
            );
            out
        } else {
            let counter = posting.clone_inverted("Income:Interest");
            Transaction::new(txn.trade_date, payee, vec![posting, counter])
        };
        out.date_format = self.date_format.clone();
        out
    }

    /// A cleared `$0.00 = balance` entry dated at the reported balance date,
    /// falling back to the end of the statement window. `None` when the
    /// statement reports neither a balance nor a usable date.
    pub fn format_balance(&self, statement: &Statement) -> Option<Transaction> {
        let date = statement.balance_date.or(statement.end_date)?;
        let balance = statement.balance?;
        let mut txn = Transaction::new(
            date,
            "--Autosync Balance Assertion",
            vec![
                Posting::new(self.name.clone(), Amount::new(Decimal::ZERO, self.currency.clone()))
                    .with_assertion(Amount::new(balance, self.currency.clone())),
            ],
        );
        txn.cleared = true;
        txn.date_format = self.date_format.clone();
        Some(txn)
    }

    /// A starting-balance entry: the reported balance minus everything in
    /// this statement, dated at the start of the statement window.
    pub fn format_initial_balance(&self, statement: &Statement) -> Option<Transaction> {
        let balance = statement.balance?;
        let start = statement.start_date?;
        let mut initial = balance;
        for txn in &statement.transactions {
            if let Some(amount) = txn.amount() {
                initial -= amount;
            }
        }
        let posting = Posting::new(self.name.clone(), Amount::new(initial, self.currency.clone()))
            .with_tag("ofxid", self.ids.build(AUTOSYNC_INITIAL));
        let counter = posting.clone_inverted("Assets:Equity");
        let mut txn = Transaction::new(start, "--Autosync Initial Balance", vec![posting, counter]);
        txn.cleared = true;
        txn.date_format = self.date_format.clone();
        Some(txn)
    }

    /// A ledger price directive for a reported holding.
    pub fn format_position(&self, position: &Position) -> String {
        format!(
            "P {} {} {}\n",
            position.date.format("%Y/%m/%d %H:%M:%S"),
            self.security_name(&position.security_id),
            position.unit_price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::AccountRedaction;
    use crate::ofx::{Account, Institution, Security};
    use chrono::NaiveDate;
    use rstest::rstest;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bank_txn(
        id: &str,
        y: i32,
        m: u32,
        d: u32,
        amount: &str,
        payee: &str,
        memo: &str,
    ) -> StatementTransaction {
        StatementTransaction::Bank(BankTransaction {
            id: id.to_string(),
            date: date(y, m, d),
            amount: dec(amount),
            txn_type: "credit".to_string(),
            payee: payee.to_string(),
            memo: memo.to_string(),
            checknum: None,
        })
    }

    fn checking_ofx() -> Ofx {
        Ofx {
            institution: Some(Institution {
                organization: "Example Bank".to_string(),
                fid: Some("1101".to_string()),
            }),
            account: Some(Account {
                account_id: "1452687~7".to_string(),
                statement: Statement {
                    currency: "USD".to_string(),
                    transactions: vec![
                        bank_txn(
                            "0000486", 2011, 3, 31, "0.01",
                            "DIVIDEND EARNED FOR PERIOD OF 03",
                            "DIVIDEND EARNED FOR PERIOD OF 03/01/2011 THROUGH 03/31/2011 ANNUAL PERCENTAGE YIELD EARNED IS 0.05%",
                        ),
                        bank_txn(
                            "0000487", 2011, 4, 5, "-34.51",
                            "AUTOMATIC WITHDRAWAL, ELECTRIC B",
                            "AUTOMATIC WITHDRAWAL, ELECTRIC BILL WEB(S )",
                        ),
                        bank_txn("0000488", 2011, 4, 7, "-25.00", "RETURNED CHECK FEE", ""),
                    ],
                    positions: Vec::new(),
                    balance: Some(dec("100.99")),
                    balance_date: Some(date(2013, 5, 25)),
                    start_date: Some(date(2000, 1, 1)),
                    end_date: Some(date(2011, 4, 7)),
                },
            }),
            securities: Vec::new(),
        }
    }

    fn investment_txn(kind: &str) -> InvestmentTransaction {
        InvestmentTransaction {
            id: "0123456789020201120120720".to_string(),
            kind: kind.to_string(),
            trade_date: date(2012, 7, 20),
            settle_date: None,
            memo: "YOU BOUGHT".to_string(),
            security_id: "458140100".to_string(),
            income_type: String::new(),
            transfer_action: String::new(),
            units: dec("100.00000"),
            unit_price: dec("25.635000000"),
            fees: Decimal::ZERO,
            commission: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    fn investment_ofx(txns: Vec<InvestmentTransaction>) -> Ofx {
        Ofx {
            institution: Some(Institution {
                organization: "Broker".to_string(),
                fid: Some("7776".to_string()),
            }),
            account: Some(Account {
                account_id: "01234567890".to_string(),
                statement: Statement {
                    currency: "USD".to_string(),
                    transactions: txns
                        .into_iter()
                        .map(StatementTransaction::Investment)
                        .collect(),
                    ..Statement::default()
                },
            }),
            securities: vec![
                Security {
                    unique_id: "458140100".to_string(),
                    ticker: Some("INTC".to_string()),
                },
                Security {
                    unique_id: "55555W555".to_string(),
                    ticker: Some("BAZ".to_string()),
                },
            ],
        }
    }

    #[test]
    fn bank_txn_prefers_full_memo_and_uses_misc_counter() {
        let ofx = checking_ofx();
        let mut converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        let expected = r#"2011/03/31 DIVIDEND EARNED FOR PERIOD OF 03/01/2011 THROUGH 03/31/2011 ANNUAL PERCENTAGE YIELD EARNED IS 0.05%
    Foo                                                     $0.01
    ; ofxid: 1101.1452687~7.0000486
    Expenses:Misc                                          -$0.01
"#;
        assert_eq!(expected, converter.convert(txn).format(4));
    }

    #[test]
    fn unknown_account_replaces_misc() {
        let ofx = checking_ofx();
        let opts = ConverterOptions {
            unknown_account: Some("Expenses:Unknown".to_string()),
            ..ConverterOptions::default()
        };
        let mut converter = OfxConverter::new(&ofx, "Foo", None, &opts).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        assert_eq!(
            "Expenses:Unknown",
            converter.convert(txn).postings[1].account
        );
    }

    struct FakeLedger {
        payee: &'static str,
        account: &'static str,
    }

    impl LedgerQuery for FakeLedger {
        fn transaction_exists_by_tag(&mut self, _key: &str, _value: &str) -> bool {
            false
        }

        fn account_for_payee(&mut self, payee: &str, exclude: &str) -> Option<String> {
            if payee == self.payee && self.account != exclude {
                Some(self.account.to_string())
            } else {
                None
            }
        }
    }

    #[test]
    fn counter_account_comes_from_ledger_history() {
        let ofx = checking_ofx();
        let mut ledger = FakeLedger {
            payee: "AUTOMATIC WITHDRAWAL, ELECTRIC BILL WEB(S )",
            account: "Expenses:Bar",
        };
        let mut converter = OfxConverter::new(
            &ofx,
            "Assets:Foo",
            Some(&mut ledger),
            &ConverterOptions::default(),
        )
        .unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[1];
        let expected = r#"2011/04/05 AUTOMATIC WITHDRAWAL, ELECTRIC BILL WEB(S )
    Assets:Foo                                            -$34.51
    ; ofxid: 1101.1452687~7.0000487
    Expenses:Bar                                           $34.51
"#;
        assert_eq!(expected, converter.convert(txn).format(4));
    }

    #[test]
    fn buy_posts_units_with_price_and_fee_legs() {
        let mut txn = investment_txn("buystock");
        txn.commission = dec("7.95");
        let ofx = investment_ofx(vec![txn]);
        let mut converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        let expected = r#"2012/07/20 YOU BOUGHT
    Foo                                            100.00000 INTC @ $25.635000000
    ; ofxid: 7776.01234567890.0123456789020201120120720
    Assets:Unknown                                      -$2571.45
    Expenses:Commissions                                    $7.95
"#;
        assert_eq!(expected, converter.convert(txn).format(4));
    }

    #[test]
    fn buy_without_payee_or_memo_names_the_kind() {
        let mut txn = investment_txn("buystock");
        txn.memo = String::new();
        let ofx = investment_ofx(vec![txn]);
        let converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        assert_eq!("Foo: buystock", converter.format_payee(txn));
    }

    #[test]
    fn transfer_txn_posts_against_transfer() {
        let txn = InvestmentTransaction {
            id: "123456-01.3".to_string(),
            kind: "transfer".to_string(),
            trade_date: date(2014, 6, 30),
            settle_date: None,
            memo: String::new(),
            security_id: "55555W555".to_string(),
            income_type: String::new(),
            transfer_action: "out".to_string(),
            units: dec("-9.060702"),
            unit_price: dec("21.928764"),
            fees: Decimal::ZERO,
            commission: Decimal::ZERO,
            total: Decimal::ZERO,
        };
        let mut ofx = investment_ofx(vec![txn]);
        ofx.institution = Some(Institution {
            organization: "401k".to_string(),
            fid: Some("1234".to_string()),
        });
        ofx.account.as_mut().unwrap().account_id = "12345678".to_string();
        let mut converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        let expected = r#"2014/06/30 Foo: transfer: out
    Foo                                             -9.060702 BAZ @ $21.928764
    ; ofxid: 1234.12345678.123456-01.3
    Transfer                                              $198.69
"#;
        assert_eq!(expected, converter.convert(txn).format(4));
    }

    #[test]
    fn dividend_income_tags_the_security() {
        let txn = InvestmentTransaction {
            id: "123456-01.redacted".to_string(),
            kind: "income".to_string(),
            trade_date: date(2016, 10, 12),
            settle_date: None,
            memo: "DIVIDEND RECEIVED".to_string(),
            security_id: "cusip_redacted".to_string(),
            income_type: "DIV".to_string(),
            transfer_action: String::new(),
            units: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            fees: Decimal::ZERO,
            commission: Decimal::ZERO,
            total: dec("1234.56"),
        };
        let mut ofx = investment_ofx(vec![txn]);
        ofx.institution = Some(Institution {
            organization: "401k".to_string(),
            fid: Some("1234".to_string()),
        });
        ofx.account.as_mut().unwrap().account_id = "12345678".to_string();
        let mut converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        let expected = r#"2016/10/12 DIVIDEND RECEIVED
    ; dividend_from: cusip_redacted
    Foo                                                  $1234.56
    ; ofxid: 1234.12345678.123456-01.redacted
    Income:Dividends                                    -$1234.56
"#;
        assert_eq!(expected, converter.convert(txn).format(4));
    }

    #[test]
    fn non_dividend_income_goes_to_interest() {
        let mut txn = investment_txn("income");
        txn.income_type = "INTEREST".to_string();
        txn.total = dec("3.21");
        let ofx = investment_ofx(vec![txn]);
        let mut converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        let converted = converter.convert(txn);
        assert_eq!("Income:Interest", converted.postings[1].account);
        assert!(converted.metadata.is_empty());
    }

    #[rstest]
    #[case("{memo}", "DIVIDEND EARNED FOR PERIOD OF 03/01/2011 THROUGH 03/31/2011 ANNUAL PERCENTAGE YIELD EARNED IS 0.05%")]
    #[case("{payee}", "DIVIDEND EARNED FOR PERIOD OF 03")]
    #[case("{account}", "Foo")]
    #[case(" {account} ", "Foo")]
    #[case("{txntype}", "credit")]
    fn payee_format_substitutes_fields(#[case] template: &str, #[case] expected: &str) {
        let ofx = checking_ofx();
        let opts = ConverterOptions {
            payee_format: Some(template.to_string()),
            ..ConverterOptions::default()
        };
        let converter = OfxConverter::new(&ofx, "Foo", None, &opts).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        assert_eq!(expected, converter.format_payee(txn));
    }

    #[test]
    fn payee_format_exposes_tferaction() {
        let mut txn = investment_txn("transfer");
        txn.transfer_action = "in".to_string();
        let ofx = investment_ofx(vec![txn]);
        let opts = ConverterOptions {
            payee_format: Some("{tferaction}".to_string()),
            ..ConverterOptions::default()
        };
        let converter = OfxConverter::new(&ofx, "Foo", None, &opts).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        assert_eq!("in", converter.format_payee(txn));
    }

    #[test]
    fn settlement_date_becomes_aux_date_only_when_it_differs() {
        let mut txn = investment_txn("buystock");
        txn.settle_date = Some(date(2012, 7, 23));
        let ofx = investment_ofx(vec![txn.clone()]);
        let mut converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let converted = converter.convert(&StatementTransaction::Investment(txn.clone()));
        assert_eq!(Some(date(2012, 7, 23)), converted.aux_date);
        assert!(converted.format(4).starts_with("2012/07/20=2012/07/23 "));

        txn.settle_date = Some(txn.trade_date);
        let converted = converter.convert(&StatementTransaction::Investment(txn));
        assert_eq!(None, converted.aux_date);
    }

    #[test]
    fn checknum_lands_in_the_header() {
        let mut ofx = checking_ofx();
        if let Some(StatementTransaction::Bank(t)) = ofx
            .account
            .as_mut()
            .unwrap()
            .statement
            .transactions
            .get_mut(2)
        {
            t.checknum = Some("319".to_string());
        }
        let mut converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[2];
        assert!(converter
            .convert(txn)
            .format(4)
            .starts_with("2011/04/07 (319) RETURNED CHECK FEE\n"));
    }

    #[test]
    fn shortened_account_appears_in_ofxid() {
        let ofx = checking_ofx();
        let opts = ConverterOptions {
            redaction: Some(AccountRedaction::LastFour),
            ..ConverterOptions::default()
        };
        let mut converter = OfxConverter::new(&ofx, "Foo", None, &opts).unwrap();
        let txn = &ofx.account.as_ref().unwrap().statement.transactions[0];
        assert!(converter
            .convert(txn)
            .format(4)
            .contains("; ofxid: 1101.87~7.0000486\n"));
    }

    #[test]
    fn missing_fid_is_an_error_unless_overridden() {
        let mut ofx = checking_ofx();
        ofx.institution = None;
        assert!(OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).is_err());
        let opts = ConverterOptions {
            fid: Some("9999".to_string()),
            ..ConverterOptions::default()
        };
        let converter = OfxConverter::new(&ofx, "Foo", None, &opts).unwrap();
        assert_eq!("9999.1452687~7.1", converter.ofx_id("1"));
    }

    #[test]
    fn balance_assertion_uses_balance_date() {
        let ofx = checking_ofx();
        let converter =
            OfxConverter::new(&ofx, "Assets:Foo", None, &ConverterOptions::default()).unwrap();
        let statement = &ofx.account.as_ref().unwrap().statement;
        let expected = r#"2013/05/25 * --Autosync Balance Assertion
    Assets:Foo                                              $0.00 = $100.99
"#;
        assert_eq!(
            expected,
            converter.format_balance(statement).unwrap().format(4)
        );
    }

    #[test]
    fn balance_assertion_needs_a_date_and_a_balance() {
        let ofx = checking_ofx();
        let converter =
            OfxConverter::new(&ofx, "Assets:Foo", None, &ConverterOptions::default()).unwrap();
        let mut statement = ofx.account.as_ref().unwrap().statement.clone();
        statement.balance_date = None;
        statement.end_date = None;
        assert!(converter.format_balance(&statement).is_none());
        let mut statement = ofx.account.as_ref().unwrap().statement.clone();
        statement.balance = None;
        assert!(converter.format_balance(&statement).is_none());
    }

    #[test]
    fn initial_balance_subtracts_statement_transactions() {
        let ofx = checking_ofx();
        let converter =
            OfxConverter::new(&ofx, "Assets:Foo", None, &ConverterOptions::default()).unwrap();
        let statement = &ofx.account.as_ref().unwrap().statement;
        let expected = r#"2000/01/01 * --Autosync Initial Balance
    Assets:Foo                                            $160.49
    ; ofxid: 1101.1452687~7.autosync_initial
    Assets:Equity                                        -$160.49
"#;
        assert_eq!(
            expected,
            converter.format_initial_balance(statement).unwrap().format(4)
        );
    }

    #[test]
    fn position_renders_a_price_directive() {
        let ofx = investment_ofx(Vec::new());
        let converter =
            OfxConverter::new(&ofx, "Foo", None, &ConverterOptions::default()).unwrap();
        let position = Position {
            security_id: "458140100".to_string(),
            units: dec("422.075"),
            unit_price: dec("47.8600000"),
            date: date(2016, 10, 8).and_hms_opt(7, 30, 8).unwrap(),
        };
        assert_eq!(
            "P 2016/10/08 07:30:08 INTC 47.8600000\n",
            converter.format_position(&position)
        );
    }
}
