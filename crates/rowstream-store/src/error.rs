use thiserror::Error;

/// Result type local to rowstream-store.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Driver-level failures.
///
/// These say *what* went wrong inside a store; the streaming layer decides
/// whether that is a connection, query or fetch error from the phase it
/// happened in.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported DSN scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid DSN '{dsn}': {reason}")]
    InvalidDsn { dsn: String, reason: String },

    #[error("unknown database '{0}'")]
    UnknownDatabase(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("statement expects {expected} parameters, got {got}")]
    ParamCount { expected: usize, got: usize },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("no statement has been executed on this cursor")]
    NotExecuted,

    #[error("{0} is closed")]
    Closed(&'static str),

    #[error("bad record at line {line}: {reason}")]
    Decode { line: u64, reason: String },

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),

    #[error("injected fault: {0}")]
    Injected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error(transparent)]
    Core(#[from] rowstream_core::Error),
}
