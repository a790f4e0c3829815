use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, ensure, Context as _, Result};

use crate::args::Args;
use crate::config::{self, AccountConfig, Config};
use crate::import::csv::CsvOptions;
use crate::import::ofx::{OfxConverter, ALL_AUTOSYNC_INITIAL, AUTOSYNC_INITIAL};
use crate::import::{AccountRedaction, ConverterOptions, OfxIdBuilder};
use crate::ledger::{self, BackendChoice, LedgerQuery};
use crate::ofx::{self, Account, Ofx, StatementTransaction};
use crate::sync::{CsvSynchronizer, OfxDownload, OfxSynchronizer, SyncOptions};

pub fn main(args: Args) -> Result<()> {
    let mut cli = Cli::new(args)?;
    match cli.args.path.clone() {
        None => cli.main_sync(),
        Some(path) if is_csv(&path) => cli.main_import_csv(&path),
        Some(path) => cli.main_import_ofx(&path),
    }
}

pub struct Cli {
    args: Args,
    ledger: Option<Box<dyn LedgerQuery>>,
}

impl Cli {
    fn new(args: Args) -> Result<Self> {
        let ledger = match resolve_ledger_file(&args) {
            Some(ledger_file) => Some(ledger::open_ledger(backend_choice(&args), &ledger_file)?),
            None => None,
        };
        Ok(Cli { args, ledger })
    }

    fn main_sync(&mut self) -> Result<()> {
        let config_path = match &self.args.config {
            Some(path) => path.clone(),
            None => config::default_config_path()
                .context("no config directory; set XDG_CONFIG_HOME or HOME, or pass -c")?,
        };
        let config = Config::load(&config_path)?;
        let only = self.args.account.clone();
        let mut matched = 0;
        for account in &config.accounts {
            if let Some(only) = &only {
                if *only != account.name {
                    continue;
                }
            }
            matched += 1;
            // One bad account should not keep the others from syncing.
            if let Err(err) = self.sync_account(account) {
                log::error!("error processing account {}: {:#}", account.name, err);
            }
        }
        if let Some(only) = &only {
            ensure!(
                matched > 0,
                "no account named {:?} in {}",
                only,
                config_path.display()
            );
        }
        Ok(())
    }

    fn sync_account(&mut self, account: &AccountConfig) -> Result<()> {
        let source = CommandDownloader {
            name: account.name.clone(),
            command: account.fetch.clone(),
        };
        let opts = SyncOptions {
            max_days: self.args.max,
            resync: self.args.resync,
            fid: self.args.fid.clone(),
            redaction: self.redaction(),
        };
        let mut sync = OfxSynchronizer::new(self.ledger.as_deref_mut(), opts);
        let Some((ofx, txns)) = sync.get_new_txns(&source)? else {
            return Ok(());
        };
        self.print_ofx(&ofx, &account.name, &txns)
    }

    fn main_import_ofx(&mut self, path: &Path) -> Result<()> {
        let ofx = ofx::load(path)?;
        let name = self.account_name(&ofx)?;
        let opts = SyncOptions {
            max_days: self.args.max,
            resync: self.args.resync,
            fid: self.args.fid.clone(),
            redaction: self.redaction(),
        };
        let txns = OfxSynchronizer::new(self.ledger.as_deref_mut(), opts).filter(&ofx)?;
        self.print_ofx(&ofx, &name, &txns)
    }

    fn main_import_csv(&mut self, path: &Path) -> Result<()> {
        let opts = CsvOptions {
            name: self.args.account.clone(),
            unknown_account: self.args.unknown_account.clone(),
            payee_format: self.args.payee_format.clone(),
            date_format: self.args.date_format.clone(),
        };
        let reverse = self.args.reverse;
        let indent = self.args.indent;
        let txns =
            CsvSynchronizer::new(self.ledger.as_deref_mut()).parse_file(path, &opts, reverse)?;
        for txn in &txns {
            println!("{}", txn.format(indent));
        }
        Ok(())
    }

    /// `-a` wins; otherwise fall back to `<organization>:<account id>` from
    /// the response itself.
    fn account_name(&self, ofx: &Ofx) -> Result<String> {
        if let Some(name) = &self.args.account {
            return Ok(name.clone());
        }
        let account = ofx
            .account
            .as_ref()
            .context("OFX response has no account statement")?;
        match &ofx.institution {
            Some(institution) => Ok(format!("{}:{}", institution.organization, account.account_id)),
            None => bail!("OFX response names no institution; supply an account name with -a"),
        }
    }

    fn print_ofx(&mut self, ofx: &Ofx, name: &str, txns: &[StatementTransaction]) -> Result<()> {
        let account = ofx
            .account
            .as_ref()
            .context("OFX response has no account statement")?;
        let opts = self.converter_options();
        let print_initial =
            self.args.initial && !self.initial_already_recorded(ofx, account, &opts)?;
        let indent = self.args.indent;
        let assertions = self.args.assertions;
        let mut converter = OfxConverter::new(ofx, name, self.ledger.as_deref_mut(), &opts)?;
        if print_initial {
            if let Some(initial) = converter.format_initial_balance(&account.statement) {
                println!("{}", initial.format(indent));
            }
        }
        for txn in txns {
            println!("{}", converter.convert(txn).format(indent));
        }
        for position in &account.statement.positions {
            print!("{}", converter.format_position(position));
        }
        if assertions {
            if let Some(balance) = converter.format_balance(&account.statement) {
                println!("{}", balance.format(indent));
            }
        }
        Ok(())
    }

    /// An initial balance is only wanted once per account, and a journal
    /// carrying the global `all.autosync_initial` marker opts out entirely.
    fn initial_already_recorded(
        &mut self,
        ofx: &Ofx,
        account: &Account,
        opts: &ConverterOptions,
    ) -> Result<bool> {
        let Some(ledger) = self.ledger.as_deref_mut() else {
            return Ok(false);
        };
        let ids = OfxIdBuilder::from_ofx(
            ofx,
            &account.account_id,
            opts.fid.as_deref(),
            opts.redaction.as_ref(),
        )?;
        Ok(ledger.transaction_exists_by_tag("ofxid", &ids.build(AUTOSYNC_INITIAL))
            || ledger.transaction_exists_by_tag("ofxid", ALL_AUTOSYNC_INITIAL))
    }

    fn redaction(&self) -> Option<AccountRedaction> {
        AccountRedaction::from_flags(
            self.args.shorten_account,
            self.args.hardcode_account.as_deref(),
        )
    }

    fn converter_options(&self) -> ConverterOptions {
        ConverterOptions {
            unknown_account: self.args.unknown_account.clone(),
            payee_format: self.args.payee_format.clone(),
            date_format: self.args.date_format.clone(),
            fid: self.args.fid.clone(),
            redaction: self.redaction(),
        }
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn backend_choice(args: &Args) -> BackendChoice {
    if args.hledger {
        BackendChoice::Hledger
    } else if args.slow {
        BackendChoice::SlowLedger
    } else if args.builtin {
        BackendChoice::Builtin
    } else {
        BackendChoice::Auto
    }
}

fn resolve_ledger_file(args: &Args) -> Option<PathBuf> {
    if args.no_ledger {
        return None;
    }
    if let Some(path) = &args.ledger {
        return Some(path.clone());
    }
    match config::find_ledger_file() {
        Some(path) => Some(path),
        None => {
            eprintln!(
                "LEDGER_FILE environment variable not set, and no .ledgerrc file found, \
                 and -l argument was not supplied: running with deduplication disabled. \
                 All transactions will be printed!"
            );
            None
        }
    }
}

/// Runs an account's configured fetch command through the shell, with
/// `{days}` substituted, and treats its stdout as the OFX body.
struct CommandDownloader {
    name: String,
    command: String,
}

impl OfxDownload for CommandDownloader {
    fn description(&self) -> &str {
        &self.name
    }

    fn download(&self, days: u32) -> Result<Vec<u8>> {
        let command = self.command.replace("{days}", &days.to_string());
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .with_context(|| format!("cannot run the fetch command for {}", self.name))?;
        ensure!(
            output.status.success(),
            "fetch command for {} failed with {}: {}",
            self.name,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["ledger-sync"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn csv_files_are_detected_by_extension() {
        assert!(is_csv(Path::new("export.csv")));
        assert!(is_csv(Path::new("export.CSV")));
        assert!(!is_csv(Path::new("download.ofx")));
        assert!(!is_csv(Path::new("csv")));
    }

    #[test]
    fn backend_flags_pick_the_backend() {
        assert_eq!(BackendChoice::Auto, backend_choice(&args(&[])));
        assert_eq!(BackendChoice::Hledger, backend_choice(&args(&["--hledger"])));
        assert_eq!(BackendChoice::SlowLedger, backend_choice(&args(&["--slow"])));
        assert_eq!(BackendChoice::Builtin, backend_choice(&args(&["--builtin"])));
    }

    #[test]
    fn no_ledger_flag_disables_discovery() {
        assert_eq!(None, resolve_ledger_file(&args(&["-L"])));
        assert_eq!(
            Some(PathBuf::from("main.lgr")),
            resolve_ledger_file(&args(&["-l", "main.lgr"]))
        );
    }

    #[test]
    fn account_name_prefers_the_flag_and_falls_back_to_the_institution() {
        let body = r#"<OFX><SIGNONMSGSRSV1><SONRS><FI><ORG>First Bank<FID>1101</FI></SONRS></SIGNONMSGSRSV1><BANKMSGSRSV1><STMTTRNRS><STMTRS><CURDEF>USD<BANKACCTFROM><ACCTID>1234</BANKACCTFROM><BANKTRANLIST></BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>"#;
        let parsed = ofx::parse(body).unwrap();

        let cli = Cli {
            args: args(&["-a", "Assets:Checking"]),
            ledger: None,
        };
        assert_eq!("Assets:Checking", cli.account_name(&parsed).unwrap());

        let cli = Cli {
            args: args(&[]),
            ledger: None,
        };
        assert_eq!("First Bank:1234", cli.account_name(&parsed).unwrap());

        let mut anonymous = parsed.clone();
        anonymous.institution = None;
        assert!(cli.account_name(&anonymous).is_err());
    }

    #[test]
    fn command_downloader_substitutes_days_and_captures_stdout() {
        let source = CommandDownloader {
            name: "Checking".to_string(),
            command: "printf 'days=%s' {days}".to_string(),
        };
        assert_eq!(b"days=14".to_vec(), source.download(14).unwrap());
    }

    #[test]
    fn command_downloader_reports_failing_commands() {
        let source = CommandDownloader {
            name: "Checking".to_string(),
            command: "echo broken >&2; exit 3".to_string(),
        };
        let err = source.download(7).unwrap_err().to_string();
        assert!(err.contains("Checking"), "{}", err);
        assert!(err.contains("broken"), "{}", err);
    }
}
