pub mod archive;
pub mod backup;
pub mod batch;
pub mod browse;
pub mod export;
pub mod import;
pub mod init;
pub mod process;
pub mod queue;
pub mod status;

use std::collections::HashSet;

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::{Result, TxError};
use crate::fmt::check_date_format;
use crate::models::Transaction;
use crate::queues::{list_queue, Queue};
use crate::render::OutputFormat;
use crate::settings::{load_settings, Settings};

fn parse_queue(s: &str) -> std::result::Result<Queue, String> {
    s.parse::<Queue>().map_err(|e| e.to_string())
}

fn parse_date_format(s: &str) -> std::result::Result<String, String> {
    check_date_format(s)
        .map(|()| s.to_string())
        .map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(
    name = "txdesk",
    version,
    about = "Triage imported payment transactions into debit, NSF and exception queues."
)]
pub struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which transactions of a queue a command acts on.
#[derive(Args, Debug, Clone)]
pub struct Selection {
    /// Queue: prelevements, nsf or exceptions
    #[arg(value_parser = parse_queue)]
    pub queue: Queue,
    /// Transaction ids (must all be in the queue)
    #[arg(required_unless_present = "all")]
    pub ids: Vec<String>,
    /// Take the whole queue
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RenderOpts {
    /// Report output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
    /// Directory for the rendered reports (default: <data_dir>/reports)
    #[arg(long = "output-dir")]
    pub output_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for txdesk data (default: ~/Documents/txdesk)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Company name printed on reports
        #[arg(long)]
        company: Option<String>,
    },
    /// Import a JSON transaction export.
    Import {
        /// Path to the JSON file
        file: String,
    },
    /// List the transactions waiting in a queue.
    Queue {
        /// Queue: prelevements, nsf or exceptions
        #[arg(value_parser = parse_queue)]
        queue: Queue,
    },
    /// Show settings, database location and queue counts.
    Status,
    /// Mark transactions processed without printing.
    Process {
        #[command(flatten)]
        selection: Selection,
    },
    /// Mark transactions processed, export NSF files and print reports.
    Batch {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        render: RenderOpts,
    },
    /// Print reports for a selection without changing anything.
    Print {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        render: RenderOpts,
    },
    /// Print the last recorded batch again.
    Reprint {
        #[command(flatten)]
        render: RenderOpts,
    },
    /// Export CSV files.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Move an exported file into the dated archive.
    Archive {
        /// File to archive
        file: String,
        /// Archive root (default: <data_dir>/archive)
        #[arg(long = "archive-dir")]
        archive_dir: Option<String>,
    },
    /// Interactively browse and process the queues.
    Browse,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/txdesk-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export NSF transactions as CSV.
    Nsf {
        /// Transaction ids (must all be in the NSF queue)
        #[arg(required_unless_present = "all")]
        ids: Vec<String>,
        /// Export the whole NSF queue
        #[arg(long, conflicts_with = "ids")]
        all: bool,
        /// Write the readable UTF-8 summary instead of the locked format
        #[arg(long)]
        summary: bool,
        /// Output file (default: NSF output dir, NSF_yyyyMMdd_HHmmss.csv)
        #[arg(long)]
        output: Option<String>,
        /// chrono format for the date columns of the locked format
        #[arg(long = "date-format", value_parser = parse_date_format)]
        date_format: Option<String>,
    },
}

/// Load settings and open the initialized database.
pub(crate) fn open_db() -> Result<(Settings, Connection)> {
    let settings = load_settings();
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(TxError::Other(format!(
            "No database at {}. Run `txdesk init` first.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    Ok((settings, conn))
}

/// Resolve a selection against the current queue contents. Explicit ids
/// keep the queue's order and must all be in the queue.
pub(crate) fn resolve_selection(
    conn: &Connection,
    queue: Queue,
    ids: &[String],
    all: bool,
) -> Result<Vec<Transaction>> {
    let rows = list_queue(conn, queue)?;
    if all {
        if rows.is_empty() {
            return Err(TxError::EmptySelection);
        }
        return Ok(rows);
    }
    if ids.is_empty() {
        return Err(TxError::EmptySelection);
    }

    let present: HashSet<&str> = rows.iter().map(|t| t.transaction_id.as_str()).collect();
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !present.contains(id.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TxError::NotInQueue {
            queue: queue.label().to_string(),
            ids: missing,
        });
    }

    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    Ok(rows
        .into_iter()
        .filter(|t| wanted.contains(t.transaction_id.as_str()))
        .collect())
}

pub(crate) fn ids_of(txs: &[Transaction]) -> Vec<String> {
    txs.iter().map(|t| t.transaction_id.clone()).collect()
}
