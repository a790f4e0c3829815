use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::{filter_accounts, LedgerQuery};
use crate::import::clean_id;

/// In-process fallback when neither `ledger` nor `hledger` is installed.
/// Reads just enough of the journal grammar for the two queries this tool
/// needs: `; key: value` tags and payee/account pairs. Directives, amounts
/// and balance assertions are passed over.
pub struct JournalReader {
    tags: HashMap<String, HashSet<String>>,
    payees: HashMap<String, Vec<String>>,
}

fn strip_inline_comment(line: &str) -> &str {
    match line.find(" ;") {
        Some(at) => &line[..at],
        None => line,
    }
}

/// Header shape: `date[=auxdate] [*|!] [(code)] payee`.
fn parse_header_payee(head: &str) -> String {
    let rest = match head.split_once(char::is_whitespace) {
        Some((_, rest)) => rest.trim_start(),
        None => return String::new(),
    };
    let rest = match rest.strip_prefix('*').or_else(|| rest.strip_prefix('!')) {
        Some(stripped) => stripped.trim_start(),
        None => rest,
    };
    let rest = match rest.strip_prefix('(') {
        Some(stripped) => match stripped.split_once(')') {
            Some((_, after)) => after.trim_start(),
            None => stripped,
        },
        None => rest,
    };
    rest.trim_end().to_string()
}

/// The account of a posting line runs up to two spaces or a tab; a lone
/// account with no amount takes the whole line.
fn posting_account(body: &str) -> String {
    let cut = [body.find("  "), body.find('\t')]
        .into_iter()
        .flatten()
        .min();
    match cut {
        Some(at) => body[..at].trim_end().to_string(),
        None => body.trim_end().to_string(),
    }
}

fn parse_tag(comment: &str) -> Option<(String, String)> {
    let (key, value) = comment.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

impl JournalReader {
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read ledger file {}", path.display()))?;
        Ok(Self::from_text(&text))
    }

    pub fn from_text(text: &str) -> Self {
        let mut tags: HashMap<String, HashSet<String>> = HashMap::new();
        let mut payees: HashMap<String, Vec<String>> = HashMap::new();
        let mut current_payee: Option<String> = None;
        for line in text.lines() {
            if line.starts_with(|c: char| c.is_ascii_digit()) {
                current_payee = Some(parse_header_payee(strip_inline_comment(line)));
            } else if line.starts_with(' ') || line.starts_with('\t') {
                let body = line.trim_start();
                if body.is_empty() {
                    continue;
                }
                let payee = match &current_payee {
                    Some(payee) => payee,
                    None => continue,
                };
                if let Some(comment) = body.strip_prefix(';') {
                    if let Some((key, value)) = parse_tag(comment) {
                        tags.entry(key).or_default().insert(value);
                    }
                } else {
                    payees
                        .entry(payee.clone())
                        .or_default()
                        .push(posting_account(body));
                }
            } else {
                // Blank lines and directives end the current transaction.
                current_payee = None;
            }
        }
        JournalReader { tags, payees }
    }
}

impl LedgerQuery for JournalReader {
    fn transaction_exists_by_tag(&mut self, key: &str, value: &str) -> bool {
        self.tags
            .get(key)
            .map(|values| values.contains(&clean_id(value)))
            .unwrap_or(false)
    }

    fn account_for_payee(&mut self, payee: &str, exclude: &str) -> Option<String> {
        filter_accounts(self.payees.get(payee)?, exclude)
    }
}
