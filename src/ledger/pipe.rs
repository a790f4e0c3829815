use std::collections::HashMap;
use std::io::{Read, Write as _};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result};
use regex::Regex;

use super::{filter_accounts, parse_register_rows, payees_from_register_csv, LedgerQuery};
use crate::import::clean_id;

/// Ledger answers a register query in well under a second; anything longer
/// means the process is wedged.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+$").expect("word pattern"))
}

/// Quoting for ledger's interactive command line: slashes would start a
/// regex, percent signs a format directive, and anything that is not a
/// plain word needs wrapping.
fn pipe_quote(arg: &str) -> String {
    let cleaned = arg.replace('/', r"\\/").replace('%', "");
    if word_re().is_match(&cleaned) {
        cleaned
    } else {
        format!("\"{}\"", cleaned)
    }
}

/// Talks to one long-lived `ledger` process over its interactive prompt.
/// A reader thread drains stdout and hands over one message per prompt;
/// queries wait on that channel with a timeout.
pub struct PipedLedger {
    child: Child,
    stdin: ChildStdin,
    responses: Receiver<String>,
    payees: Option<HashMap<String, Vec<String>>>,
}

fn find_prompt(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == b"] ")
}

fn pump_stdout(mut stdout: impl Read, sender: Sender<String>) {
    let mut pending = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stdout.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                pending.extend_from_slice(&chunk[..n]);
                // The interactive prompt is "] " with no newline; everything
                // before it is the response to the last command.
                while let Some(pos) = find_prompt(&pending) {
                    let body = String::from_utf8_lossy(&pending[..pos]).into_owned();
                    pending.drain(..pos + 2);
                    if sender.send(body).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

impl PipedLedger {
    pub fn open(ledger_file: &Path) -> Result<Self> {
        let mut child = Command::new("ledger")
            .arg("--args-only")
            .arg("-f")
            .arg(ledger_file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("cannot start the ledger subprocess")?;
        let stdin = child
            .stdin
            .take()
            .context("ledger subprocess has no stdin")?;
        let stdout = child
            .stdout
            .take()
            .context("ledger subprocess has no stdout")?;
        let (sender, responses) = mpsc::channel();
        thread::spawn(move || pump_stdout(stdout, sender));
        let backend = PipedLedger {
            child,
            stdin,
            responses,
            payees: None,
        };
        backend
            .responses
            .recv_timeout(RESPONSE_TIMEOUT)
            .context("no prompt from the ledger subprocess")?;
        Ok(backend)
    }

    fn run(&mut self, args: &[&str]) -> Result<String> {
        let mut line = String::from("csv");
        for arg in args {
            line.push(' ');
            line.push_str(&pipe_quote(arg));
        }
        line.push('\n');
        log::debug!("ledger query: {}", line.trim_end());
        self.stdin
            .write_all(line.as_bytes())
            .context("cannot write to the ledger subprocess")?;
        self.stdin
            .flush()
            .context("cannot flush the ledger subprocess")?;
        self.responses
            .recv_timeout(RESPONSE_TIMEOUT)
            .context("no response from the ledger subprocess")
    }
}

impl LedgerQuery for PipedLedger {
    fn transaction_exists_by_tag(&mut self, key: &str, value: &str) -> bool {
        let query = format!("{}={}", key, clean_id(value));
        match self.run(&["-E", "meta", &query]) {
            Ok(body) => !parse_register_rows(&body).is_empty(),
            Err(err) => {
                log::error!("ledger tag query failed: {:#}", err);
                false
            }
        }
    }

    fn account_for_payee(&mut self, payee: &str, exclude: &str) -> Option<String> {
        if self.payees.is_none() {
            let payees = match self.run(&[]) {
                Ok(body) => payees_from_register_csv(&body),
                Err(err) => {
                    log::error!("cannot load payees from ledger: {:#}", err);
                    HashMap::new()
                }
            };
            self.payees = Some(payees);
        }
        let payees = self.payees.as_ref()?;
        filter_accounts(payees.get(payee)?, exclude)
    }
}

impl Drop for PipedLedger {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
