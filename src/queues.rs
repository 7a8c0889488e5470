use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;

use crate::error::{Result, TxError};
use crate::models::Transaction;
use crate::workflow::{row_to_transaction, TX_SELECT};

// ---------------------------------------------------------------------------
// Classification rules
// ---------------------------------------------------------------------------
//
// Exceptions win over everything else, then pending debits, then NSF. The
// three predicates are mutually exclusive; `classify` is the same logic in
// Rust and the two must stay in step.

const EXCEPTIONS_WHERE: &str = "(is_exception = 1 OR (transaction_status = 'cancelled' AND is_verifier = 0)) \
     AND NOT (transaction_status IN ('in progress', 'reopen') \
              AND (is_prelevement_done = 1 OR is_nsf_done = 1))";

const PRELEVEMENTS_WHERE: &str = "is_prelevement_done = 0 AND is_exception = 0 \
     AND transaction_status <> 'cancelled'";

const NSF_WHERE: &str = "transaction_status = 'failed' AND is_prelevement_done = 1 \
     AND is_nsf_done = 0 AND is_exception = 0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    Prelevements,
    Nsf,
    Exceptions,
}

impl Queue {
    pub const ALL: [Queue; 3] = [Queue::Prelevements, Queue::Nsf, Queue::Exceptions];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Prelevements => "prelevements",
            Self::Nsf => "nsf",
            Self::Exceptions => "exceptions",
        }
    }

    /// Operator-facing name, as printed on report headers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Prelevements => "Prélèvements",
            Self::Nsf => "NSF",
            Self::Exceptions => "Exceptions",
        }
    }

    fn where_clause(&self) -> &'static str {
        match self {
            Self::Prelevements => PRELEVEMENTS_WHERE,
            Self::Nsf => NSF_WHERE,
            Self::Exceptions => EXCEPTIONS_WHERE,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Self::Prelevements => "credit_amount ASC, transaction_id ASC",
            Self::Nsf | Self::Exceptions => "last_modified ASC, transaction_id ASC",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Queue {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "prelevements" | "prelevement" | "prélèvements" | "prélèvement" | "debits" => {
                Ok(Self::Prelevements)
            }
            "nsf" => Ok(Self::Nsf),
            "exceptions" | "exception" => Ok(Self::Exceptions),
            _ => Err(TxError::UnknownQueue(s.to_string())),
        }
    }
}

fn is_reopened_status(status: &str) -> bool {
    status == "in progress" || status == "reopen"
}

/// The queue a transaction currently sits in, `None` once it is settled.
pub fn classify(tx: &Transaction) -> Option<Queue> {
    let status = tx.transaction_status.as_str();
    let processed = tx.is_prelevement_done || tx.is_nsf_done;

    let exception = (tx.is_exception || (status == "cancelled" && !tx.is_verifier))
        && !(is_reopened_status(status) && processed);
    if exception {
        return Some(Queue::Exceptions);
    }
    if !tx.is_prelevement_done && !tx.is_exception && status != "cancelled" {
        return Some(Queue::Prelevements);
    }
    if status == "failed" && tx.is_prelevement_done && !tx.is_nsf_done && !tx.is_exception {
        return Some(Queue::Nsf);
    }
    None
}

pub fn list_queue(conn: &Connection, queue: Queue) -> Result<Vec<Transaction>> {
    let sql = format!(
        "{TX_SELECT} WHERE {} ORDER BY {}",
        queue.where_clause(),
        queue.order_by()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    log::debug!("event=queue_list queue={queue} count={}", rows.len());
    Ok(rows)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounts {
    pub prelevements: i64,
    pub nsf: i64,
    pub exceptions: i64,
    pub total: i64,
}

impl QueueCounts {
    pub fn get(&self, queue: Queue) -> i64 {
        match queue {
            Queue::Prelevements => self.prelevements,
            Queue::Nsf => self.nsf,
            Queue::Exceptions => self.exceptions,
        }
    }
}

pub fn queue_counts(conn: &Connection) -> Result<QueueCounts> {
    let count = |clause: &str| -> Result<i64> {
        Ok(conn.query_row(
            &format!("SELECT count(*) FROM transactions WHERE {clause}"),
            [],
            |r| r.get(0),
        )?)
    };
    Ok(QueueCounts {
        prelevements: count(PRELEVEMENTS_WHERE)?,
        nsf: count(NSF_WHERE)?,
        exceptions: count(EXCEPTIONS_WHERE)?,
        total: count("1 = 1")?,
    })
}
