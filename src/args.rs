use std::path::PathBuf;

use clap::Parser;

/// Download bank transactions and print the ones your ledger file does not
/// already contain, as ledger postings.
#[derive(Parser, Debug)]
pub struct Args {
    /// OFX or CSV file to import. Omit to sync every configured account.
    pub path: Option<PathBuf>,

    /// Ledger account the postings belong to. Required for most CSV formats;
    /// in sync mode restricts the run to the named account.
    #[clap(short, long)]
    pub account: Option<String>,

    /// Ledger file to check for already-imported transactions.
    #[clap(short, long)]
    pub ledger: Option<PathBuf>,

    /// Don't look for a ledger file; print every transaction.
    #[clap(short = 'L', long)]
    pub no_ledger: bool,

    /// Number of spaces postings are indented by.
    #[clap(short, long, default_value_t = 4)]
    pub indent: usize,

    /// Largest download window, in days.
    #[clap(short, long, default_value_t = 90, value_name = "DAYS")]
    pub max: u32,

    /// Start at the largest window instead of growing into it.
    #[clap(short, long)]
    pub resync: bool,

    /// Print an initial balance transaction if the ledger has none.
    #[clap(long)]
    pub initial: bool,

    /// Append a balance assertion for each statement.
    #[clap(long)]
    pub assertions: bool,

    /// Institution id for ofxid tags, for responses that carry none.
    #[clap(long)]
    pub fid: Option<String>,

    /// Keep only the last four characters of the account id in ofxid tags.
    #[clap(long)]
    pub shorten_account: bool,

    /// Replace the account id in ofxid tags with this string.
    #[clap(long, conflicts_with = "shorten_account", value_name = "ID")]
    pub hardcode_account: Option<String>,

    /// Account to post against when no better guess exists.
    #[clap(long, value_name = "ACCOUNT")]
    pub unknown_account: Option<String>,

    /// Payee template; {payee}, {memo}, {account}, {txntype} and
    /// {tferaction} expand for OFX, column names for CSV.
    #[clap(long, value_name = "TEMPLATE")]
    pub payee_format: Option<String>,

    /// strftime format dates are printed with.
    #[clap(long, value_name = "FORMAT")]
    pub date_format: Option<String>,

    /// Emit CSV rows in reverse file order (for newest-first exports).
    #[clap(long)]
    pub reverse: bool,

    /// Query the ledger file with hledger.
    #[clap(long, conflicts_with_all = ["slow", "builtin"])]
    pub hledger: bool,

    /// Run a fresh ledger process per query instead of a long-lived one.
    #[clap(long, conflicts_with = "builtin")]
    pub slow: bool,

    /// Parse the ledger file directly, without ledger or hledger.
    #[clap(long)]
    pub builtin: bool,

    /// Log at debug level.
    #[clap(short, long)]
    pub debug: bool,

    /// Accounts file for sync mode.
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub fn parse() -> Args {
    Args::parse()
}
