use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context as _, Result};
use serde::Deserialize;

/// One account in the sync config: a ledger account name and a shell
/// command that prints an OFX body for the last `{days}` days to stdout.
#[derive(Debug, Deserialize)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct AccountConfig {
    pub name: String,
    pub fetch: String,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub accounts: Vec<AccountConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("cannot parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.accounts.is_empty(), "config lists no accounts");
        for account in &self.accounts {
            ensure!(
                !account.name.is_empty(),
                "config has an account with an empty name"
            );
            ensure!(
                !account.fetch.is_empty(),
                "account {} has no fetch command",
                account.name
            );
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/ledger-sync/accounts.yaml`, falling back to
/// `~/.config`.
pub fn default_config_path() -> Option<PathBuf> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("ledger-sync").join("accounts.yaml"))
}

/// Journal discovery when `-l` is not given: `LEDGER_FILE`, then the
/// `--file` argument in `~/.ledgerrc`.
pub fn find_ledger_file() -> Option<PathBuf> {
    if let Some(path) = env::var_os("LEDGER_FILE") {
        return Some(PathBuf::from(path));
    }
    let home = env::var_os("HOME")?;
    let text = fs::read_to_string(PathBuf::from(home).join(".ledgerrc")).ok()?;
    ledger_file_from_rc(&text)
}

fn ledger_file_from_rc(text: &str) -> Option<PathBuf> {
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "--file" {
            return tokens.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_accounts_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "accounts:\n\
             \x20 - name: Assets:Checking\n\
             \x20   fetch: \"fetch-checking --days {{days}}\"\n\
             \x20 - name: Assets:Savings\n\
             \x20   fetch: fetch-savings\n"
        )
        .unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(2, config.accounts.len());
        assert_eq!(
            AccountConfig {
                name: "Assets:Checking".to_string(),
                fetch: "fetch-checking --days {days}".to_string(),
            },
            config.accounts[0]
        );
    }

    #[test]
    fn rejects_configs_without_accounts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "accounts: []\n").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_accounts_without_fetch_commands() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "accounts:\n  - name: Assets:Checking\n    fetch: \"\"\n").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn ledgerrc_file_argument_is_honored() {
        assert_eq!(
            Some(PathBuf::from("/home/user/ledger.lgr")),
            ledger_file_from_rc("--sort date\n--file /home/user/ledger.lgr\n")
        );
        assert_eq!(None, ledger_file_from_rc("--sort date\n"));
        assert_eq!(None, ledger_file_from_rc("--file"));
    }
}
