use std::path::PathBuf;

/// Errors that abort a run before any transaction output is produced.
///
/// Everything else (I/O, parse failures, child process trouble) is reported
/// through [`anyhow`] with context attached at the call site.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// The OFX response carries no institution block, so transaction ids
    /// would not be stable across runs.
    #[error(
        "OFX response has no institution, cannot build stable transaction ids; \
         pass --fid to supply one"
    )]
    EmptyInstitution,

    /// The CSV header row did not match any known export format.
    #[error("unrecognized CSV format in {} (columns: {columns})", .path.display())]
    UnknownCsvFormat { path: PathBuf, columns: String },

    /// A ledger backend was requested explicitly but is not usable.
    #[error("ledger backend `{backend}` is not available: {reason}")]
    NoLedgerBackend {
        backend: &'static str,
        reason: String,
    },

    /// The selected CSV format needs an explicit account name.
    #[error("{format} CSV import requires an account name, pass -a/--account")]
    MissingAccountName { format: &'static str },
}
