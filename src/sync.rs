//! Decides which downloaded transactions are new. The OFX side walks an
//! expanding time window until it sees transactions it already knows; the
//! CSV side is a single filtered pass over the file.

use std::path::Path;

use anyhow::Result;

use crate::import::csv::{build_converter, read_rows, CsvOptions};
use crate::import::{AccountRedaction, OfxIdBuilder};
use crate::ir::Transaction;
use crate::ledger::LedgerQuery;
use crate::ofx::{Ofx, StatementTransaction};

/// A source of OFX statement bodies, windowed by day count.
pub trait OfxDownload {
    /// Human-readable label for log messages.
    fn description(&self) -> &str;

    fn download(&self, days: u32) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Widest window the expansion is allowed to reach.
    pub max_days: u32,
    /// Start at the widest window instead of expanding from one week.
    pub resync: bool,
    pub fid: Option<String>,
    pub redaction: Option<AccountRedaction>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            max_days: 90,
            resync: false,
            fid: None,
            redaction: None,
        }
    }
}

pub struct OfxSynchronizer<'a> {
    ledger: Option<&'a mut (dyn LedgerQuery + 'static)>,
    opts: SyncOptions,
}

impl<'a> OfxSynchronizer<'a> {
    pub fn new(ledger: Option<&'a mut (dyn LedgerQuery + 'static)>, opts: SyncOptions) -> Self {
        OfxSynchronizer { ledger, opts }
    }

    fn is_synced(&mut self, ofxid: &str) -> bool {
        match self.ledger.as_deref_mut() {
            Some(ledger) => ledger.transaction_exists_by_tag("ofxid", ofxid),
            None => false,
        }
    }

    /// Sorts a statement's transactions by date and drops the ones already
    /// recorded in the ledger, plus zero-amount "comment" records that some
    /// banks interleave with the transaction they annotate.
    pub fn filter(&mut self, ofx: &Ofx) -> Result<Vec<StatementTransaction>> {
        let account = match &ofx.account {
            Some(account) => account,
            None => return Ok(Vec::new()),
        };
        let ids = OfxIdBuilder::from_ofx(
            ofx,
            &account.account_id,
            self.opts.fid.as_deref(),
            self.opts.redaction.as_ref(),
        )?;
        let mut txns = account.statement.transactions.clone();
        txns.sort_by_key(|txn| txn.date());
        let mut kept: Vec<StatementTransaction> = Vec::new();
        for txn in txns {
            if self.is_synced(&ids.build(txn.id())) {
                continue;
            }
            if let (Some(amount), Some(previous)) = (txn.amount(), kept.last()) {
                if amount.is_zero() && previous.date() == txn.date() {
                    continue;
                }
            }
            kept.push(txn);
        }
        Ok(kept)
    }

    /// Downloads with a widening window until the statement stops growing,
    /// stale transactions appear, or the window hits its cap. `None` means
    /// the source never returned account data at all.
    pub fn get_new_txns(
        &mut self,
        source: &dyn OfxDownload,
    ) -> Result<Option<(Ofx, Vec<StatementTransaction>)>> {
        let max_days = self.opts.max_days;
        let mut days = if self.opts.resync || max_days < 7 {
            max_days
        } else {
            7
        };
        let mut last_total = 0usize;
        loop {
            log::debug!(
                "downloading {} days of transactions for {} (max {})",
                days,
                source.description(),
                max_days
            );
            let raw = source.download(days)?;
            let parsed = match crate::ofx::parse_bytes(&raw) {
                Ok(ofx) if ofx.account.is_some() => Some(ofx),
                Ok(_) => None,
                Err(err) => {
                    log::debug!("response is not usable OFX: {:#}", err);
                    None
                }
            };
            let ofx = match parsed {
                Some(ofx) => ofx,
                None => {
                    // Some banks answer an over-wide window with an empty or
                    // malformed body instead of an empty statement.
                    if days >= max_days {
                        log::debug!("hit max days with no account data");
                        return Ok(None);
                    }
                    days = (days * 2).min(max_days);
                    log::debug!("no account data, expanding window to {} days", days);
                    last_total = 0;
                    continue;
                }
            };
            let total = ofx
                .account
                .as_ref()
                .map(|account| account.statement.transactions.len())
                .unwrap_or(0);
            let new = self.filter(&ofx)?;
            log::debug!("{} transactions, {} new", total, new.len());
            if total > 0 && last_total == total {
                log::debug!("window grew but the statement did not, done");
                return Ok(Some((ofx, new)));
            }
            if total > new.len() {
                log::debug!("found already-synced transactions, done");
                return Ok(Some((ofx, new)));
            }
            if days >= max_days {
                log::debug!("hit max days");
                return Ok(Some((ofx, new)));
            }
            days = (days * 2).min(max_days);
            log::debug!("all transactions new, expanding window to {} days", days);
            last_total = total;
        }
    }
}

pub struct CsvSynchronizer<'a> {
    ledger: Option<&'a mut (dyn LedgerQuery + 'static)>,
}

impl<'a> CsvSynchronizer<'a> {
    pub fn new(ledger: Option<&'a mut (dyn LedgerQuery + 'static)>) -> Self {
        CsvSynchronizer { ledger }
    }

    fn is_synced(&mut self, csvid: &str) -> bool {
        match self.ledger.as_deref_mut() {
            Some(ledger) => ledger.transaction_exists_by_tag("csvid", csvid),
            None => false,
        }
    }

    /// Converts every not-yet-recorded row of the file. Rows are processed
    /// top to bottom; `reverse` flips the file for exports that list newest
    /// first.
    pub fn parse_file(
        &mut self,
        path: &Path,
        opts: &CsvOptions,
        reverse: bool,
    ) -> Result<Vec<Transaction>> {
        let (headers, mut rows) = read_rows(path)?;
        let converter = build_converter(path, &headers, opts)?;
        if reverse {
            rows.reverse();
        }
        let mut out = Vec::new();
        for row in &rows {
            if self.is_synced(&converter.row_id(row)) {
                continue;
            }
            if let Some(txn) = converter.convert(row)? {
                out.push(txn);
            }
        }
        Ok(out)
    }
}
