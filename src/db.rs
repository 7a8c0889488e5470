use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

pub const DEFAULT_COMPANY_NAME: &str = "8341855 Canada Inc";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    transaction_id TEXT PRIMARY KEY,
    full_name TEXT,
    account_name TEXT,
    transaction_datetime TEXT,
    transaction_type TEXT NOT NULL DEFAULT '',
    transaction_status TEXT NOT NULL DEFAULT '',
    notes TEXT,
    debit_amount REAL,
    credit_amount REAL,
    currency TEXT,
    hold_amount REAL,
    last_modified TEXT,
    parent_transaction_id TEXT,
    child_transaction_ids TEXT,
    client_reference_number TEXT,
    scheduled_transaction_id TEXT,
    wallet_id TEXT,
    wallet_name1 TEXT,
    wallet_name2 TEXT,
    client_account_id TEXT,
    transaction_error_code TEXT,
    transaction_failure_reason TEXT,
    transaction_flag TEXT,
    elinx_request_id TEXT,
    is_refunded INTEGER NOT NULL DEFAULT 0,
    is_refund INTEGER NOT NULL DEFAULT 0,
    is_prelevement_done INTEGER NOT NULL DEFAULT 0,
    is_nsf_done INTEGER NOT NULL DEFAULT 0,
    is_exception INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS print_batches (
    id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS print_batch_items (
    batch_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    transaction_id TEXT NOT NULL,
    PRIMARY KEY (batch_id, position),
    FOREIGN KEY (batch_id) REFERENCES print_batches(id),
    FOREIGN KEY (transaction_id) REFERENCES transactions(transaction_id)
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT
);
";

/// Columns added after the first schema. Older databases get them on open.
const COLUMN_MIGRATIONS: &[(&str, &str, &str)] = &[
    ("transactions", "is_verifier", "INTEGER NOT NULL DEFAULT 0"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    for (table, column, decl) in COLUMN_MIGRATIONS {
        ensure_column(conn, table, column, decl)?;
    }
    if get_metadata(conn, "company_name").is_none() {
        set_metadata(conn, "company_name", DEFAULT_COMPANY_NAME)?;
    }
    Ok(())
}

/// Add `column` to `table` unless it already exists. Returns true when added.
pub fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if existing.iter().any(|c| c == column) {
        return Ok(false);
    }
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))?;
    log::info!("event=db_migrate table={table} column={column}");
    Ok(true)
}

pub fn get_metadata(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .ok()
        .flatten()
}

pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

pub fn company_name(conn: &Connection) -> String {
    get_metadata(conn, "company_name").unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string())
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}
