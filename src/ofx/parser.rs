//! A tolerant OFX reader. OFX 1.x is SGML with optional closing tags, so a
//! real XML parser is no help; we scan for tags instead. Values run from the
//! tag to the next `<`, which also handles the closing tags of OFX 2.x files.

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, ensure, Context as _, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use super::{
    Account, BankTransaction, Institution, InvestmentTransaction, Ofx, Position, Security,
    Statement, StatementTransaction,
};

/// Investment aggregates we understand, in no particular order. The list
/// restores document order from byte offsets after scanning.
const INVESTMENT_KINDS: &[&str] = &[
    "buydebt", "buymf", "buyopt", "buyother", "buystock", "income", "reinvest", "selldebt",
    "sellmf", "sellopt", "sellother", "sellstock", "transfer",
];

pub fn load(path: &Path) -> Result<Ofx> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_bytes(&raw).with_context(|| format!("failed to parse {} as OFX", path.display()))
}

/// Some banks serve Latin-1; decode lossily rather than refusing the file.
pub fn parse_bytes(raw: &[u8]) -> Result<Ofx> {
    parse(&String::from_utf8_lossy(raw))
}

pub fn parse(text: &str) -> Result<Ofx> {
    let body = extract_ofx_body(text)?;
    let account = if let Some(stmt) =
        extract_block(body, "STMTRS").or_else(|| extract_block(body, "CCSTMTRS"))
    {
        Some(parse_bank_statement(stmt)?)
    } else if let Some(stmt) = extract_block(body, "INVSTMTRS") {
        Some(parse_investment_statement(stmt)?)
    } else {
        None
    };
    Ok(Ofx {
        institution: parse_institution(body),
        account,
        securities: parse_securities(body),
    })
}

fn parse_institution(body: &str) -> Option<Institution> {
    let fi = extract_block(body, "FI")?;
    Some(Institution {
        organization: extract_tag_value(fi, "ORG").unwrap_or_default().to_string(),
        fid: extract_tag_value(fi, "FID").map(str::to_string),
    })
}

fn parse_bank_statement(stmt: &str) -> Result<Account> {
    let account_id = extract_tag_value(stmt, "ACCTID")
        .context("statement has no ACCTID")?
        .to_string();
    let mut statement = statement_head(stmt);
    if let Some(list) = extract_block(stmt, "BANKTRANLIST") {
        read_list_dates(list, &mut statement);
        for block in extract_blocks(list, "STMTTRN") {
            match parse_bank_transaction(block) {
                Ok(txn) => statement.transactions.push(StatementTransaction::Bank(txn)),
                Err(err) => log::warn!("skipping malformed statement transaction: {:#}", err),
            }
        }
    }
    Ok(Account {
        account_id,
        statement,
    })
}

fn parse_investment_statement(stmt: &str) -> Result<Account> {
    let account_id = extract_tag_value(stmt, "ACCTID")
        .context("statement has no ACCTID")?
        .to_string();
    let mut statement = statement_head(stmt);
    if let Some(list) = extract_block(stmt, "INVTRANLIST") {
        read_list_dates(list, &mut statement);
        for (kind, block) in investment_blocks(list) {
            match parse_investment_transaction(kind, block) {
                Ok(txn) => statement
                    .transactions
                    .push(StatementTransaction::Investment(txn)),
                Err(err) => log::warn!("skipping malformed {} transaction: {:#}", kind, err),
            }
        }
    }
    for block in extract_blocks(stmt, "INVPOS") {
        match parse_position(block) {
            Ok(pos) => statement.positions.push(pos),
            Err(err) => log::warn!("skipping malformed position: {:#}", err),
        }
    }
    Ok(Account {
        account_id,
        statement,
    })
}

fn statement_head(stmt: &str) -> Statement {
    let mut statement = Statement {
        currency: extract_tag_value(stmt, "CURDEF")
            .unwrap_or("USD")
            .to_string(),
        ..Statement::default()
    };
    if let Some(bal) = extract_block(stmt, "LEDGERBAL") {
        statement.balance =
            extract_tag_value(bal, "BALAMT").and_then(|v| Decimal::from_str(v).ok());
        statement.balance_date =
            extract_tag_value(bal, "DTASOF").and_then(|v| parse_ofx_date(v).ok());
    }
    statement
}

fn read_list_dates(list: &str, statement: &mut Statement) {
    statement.start_date = extract_tag_value(list, "DTSTART").and_then(|v| parse_ofx_date(v).ok());
    statement.end_date = extract_tag_value(list, "DTEND").and_then(|v| parse_ofx_date(v).ok());
}

fn parse_bank_transaction(block: &str) -> Result<BankTransaction> {
    let id = extract_tag_value(block, "FITID")
        .context("missing FITID")?
        .to_string();
    let raw_date = extract_tag_value(block, "DTPOSTED").context("missing DTPOSTED")?;
    let raw_amount = extract_tag_value(block, "TRNAMT").context("missing TRNAMT")?;
    Ok(BankTransaction {
        id,
        date: parse_ofx_date(raw_date)?,
        amount: Decimal::from_str(raw_amount)
            .with_context(|| format!("bad TRNAMT {:?}", raw_amount))?,
        txn_type: extract_tag_value(block, "TRNTYPE")
            .unwrap_or_default()
            .to_ascii_lowercase(),
        payee: extract_tag_value(block, "NAME")
            .unwrap_or_default()
            .to_string(),
        memo: extract_tag_value(block, "MEMO")
            .unwrap_or_default()
            .to_string(),
        checknum: extract_tag_value(block, "CHECKNUM").map(str::to_string),
    })
}

fn parse_investment_transaction(kind: &str, block: &str) -> Result<InvestmentTransaction> {
    let id = extract_tag_value(block, "FITID")
        .context("missing FITID")?
        .to_string();
    let raw_date = extract_tag_value(block, "DTTRADE")
        .or_else(|| extract_tag_value(block, "DTSETTLE"))
        .context("missing DTTRADE")?;
    Ok(InvestmentTransaction {
        id,
        kind: kind.to_string(),
        trade_date: parse_ofx_date(raw_date)?,
        settle_date: extract_tag_value(block, "DTSETTLE")
            .map(parse_ofx_date)
            .transpose()?,
        memo: extract_tag_value(block, "MEMO")
            .unwrap_or_default()
            .to_string(),
        security_id: extract_tag_value(block, "UNIQUEID")
            .unwrap_or_default()
            .to_string(),
        income_type: extract_tag_value(block, "INCOMETYPE")
            .unwrap_or_default()
            .to_string(),
        transfer_action: extract_tag_value(block, "TFERACTION")
            .unwrap_or_default()
            .to_ascii_lowercase(),
        units: opt_decimal(block, "UNITS")?.unwrap_or_default(),
        unit_price: opt_decimal(block, "UNITPRICE")?.unwrap_or_default(),
        fees: opt_decimal(block, "FEES")?.unwrap_or_default(),
        commission: opt_decimal(block, "COMMISSION")?.unwrap_or_default(),
        total: opt_decimal(block, "TOTAL")?.unwrap_or_default(),
    })
}

fn parse_position(block: &str) -> Result<Position> {
    let security_id = extract_tag_value(block, "UNIQUEID")
        .context("position has no UNIQUEID")?
        .to_string();
    let raw_date = extract_tag_value(block, "DTPRICEASOF").context("position has no DTPRICEASOF")?;
    Ok(Position {
        security_id,
        units: opt_decimal(block, "UNITS")?.unwrap_or_default(),
        unit_price: opt_decimal(block, "UNITPRICE")?.unwrap_or_default(),
        date: parse_ofx_datetime(raw_date)?,
    })
}

fn parse_securities(body: &str) -> Vec<Security> {
    let list = match extract_block(body, "SECLIST") {
        Some(list) => list,
        None => return Vec::new(),
    };
    extract_blocks(list, "SECINFO")
        .into_iter()
        .filter_map(|block| {
            Some(Security {
                unique_id: extract_tag_value(block, "UNIQUEID")?.to_string(),
                ticker: extract_tag_value(block, "TICKER").map(str::to_string),
            })
        })
        .collect()
}

fn opt_decimal(block: &str, tag: &str) -> Result<Option<Decimal>> {
    extract_tag_value(block, tag)
        .map(|v| Decimal::from_str(v).with_context(|| format!("bad {} value {:?}", tag, v)))
        .transpose()
}

/// Skip the OFX 1.x key:value header (or the XML prolog) and return the
/// payload starting at `<OFX>`.
fn extract_ofx_body(content: &str) -> Result<&str> {
    let upper = content.to_ascii_uppercase();
    match upper.find("<OFX>") {
        Some(idx) => Ok(&content[idx..]),
        None => bail!("input has no <OFX> element, not an OFX document"),
    }
}

/// All `<TAG>...</TAG>` aggregates. When a file omits the closing tag the
/// block runs to the next occurrence of the same opening tag, or to the end.
fn extract_blocks<'a>(content: &'a str, tag: &str) -> Vec<&'a str> {
    let upper = content.to_ascii_uppercase();
    let open = format!("<{}>", tag.to_ascii_uppercase());
    let close = format!("</{}>", tag.to_ascii_uppercase());
    let mut blocks = Vec::new();
    let mut from = 0usize;
    while let Some(rel) = upper[from..].find(&open) {
        let start = from + rel + open.len();
        let end = match upper[start..].find(&close) {
            Some(rel_end) => start + rel_end,
            None => match upper[start..].find(&open) {
                Some(rel_next) => start + rel_next,
                None => content.len(),
            },
        };
        blocks.push(&content[start..end]);
        from = end;
    }
    blocks
}

fn extract_block<'a>(content: &'a str, tag: &str) -> Option<&'a str> {
    extract_blocks(content, tag).into_iter().next()
}

/// The value of the first `<TAG>`: everything up to the next `<`, trimmed.
/// Empty values count as absent.
fn extract_tag_value<'a>(content: &'a str, tag: &str) -> Option<&'a str> {
    let upper = content.to_ascii_uppercase();
    let needle = format!("<{}>", tag.to_ascii_uppercase());
    let start = upper.find(&needle)? + needle.len();
    let rest = &content[start..];
    let end = rest.find('<').unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Transaction aggregates from an INVTRANLIST, restored to document order.
fn investment_blocks(list: &str) -> Vec<(&'static str, &str)> {
    let upper = list.to_ascii_uppercase();
    let mut found: Vec<(usize, &'static str, &str)> = Vec::new();
    for kind in INVESTMENT_KINDS {
        let open = format!("<{}>", kind.to_ascii_uppercase());
        let close = format!("</{}>", kind.to_ascii_uppercase());
        let mut from = 0usize;
        while let Some(rel) = upper[from..].find(&open) {
            let start = from + rel + open.len();
            let end = match upper[start..].find(&close) {
                Some(rel_end) => start + rel_end,
                None => match upper[start..].find(&open) {
                    Some(rel_next) => start + rel_next,
                    None => list.len(),
                },
            };
            found.push((start, kind, &list[start..end]));
            from = end;
        }
    }
    found.sort_by_key(|(pos, _, _)| *pos);
    found
        .into_iter()
        .map(|(_, kind, block)| (kind, block))
        .collect()
}

/// OFX datetimes look like `YYYYMMDD`, `YYYYMMDDHHMMSS`, or
/// `YYYYMMDDHHMMSS.XXX[-5:EST]`. We take the leading digits and ignore the
/// timezone suffix, matching how statement dates are used downstream.
fn parse_ofx_datetime(raw: &str) -> Result<NaiveDateTime> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    ensure!(
        digits.len() >= 8,
        "OFX datetime has fewer than 8 leading digits: {:?}",
        raw
    );
    let date = NaiveDate::parse_from_str(&digits[..8], "%Y%m%d")
        .with_context(|| format!("bad OFX date {:?}", raw))?;
    let time = if digits.len() >= 14 {
        NaiveTime::parse_from_str(&digits[8..14], "%H%M%S")
            .with_context(|| format!("bad OFX time {:?}", raw))?
    } else {
        NaiveTime::MIN
    };
    Ok(date.and_time(time))
}

fn parse_ofx_date(raw: &str) -> Result<NaiveDate> {
    parse_ofx_datetime(raw).map(|dt| dt.date())
}
