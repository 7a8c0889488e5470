use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Unknown queue: {0} (expected prelevements, nsf or exceptions)")]
    UnknownQueue(String),

    #[error("Cannot process as NSF, not debit-processed yet: {}", .0.join(", "))]
    NotDebited(Vec<String>),

    #[error("Not in the {queue} queue: {}", .ids.join(", "))]
    NotInQueue { queue: String, ids: Vec<String> },

    #[error("No transaction selected")]
    EmptySelection,

    #[error("No valid {0} date to group the report by")]
    NoValidDates(&'static str),

    #[error("Cannot encode {0:?} as Windows-1252")]
    Encoding(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TxError>;
