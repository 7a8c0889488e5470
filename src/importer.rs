use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::fmt::{normalize_datetime, parse_amount};
use crate::models::{ImportDocument, JsonTransaction, Transaction};
use crate::workflow::{get_transaction, reopen_transaction, upsert_transaction};

/// The only transaction type taken in from an import file.
pub const IMPORTED_TYPE: &str = "EFT Funding";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Exact, untrimmed match on the type field.
fn is_imported_type(raw: Option<&str>) -> bool {
    raw == Some(IMPORTED_TYPE)
}

fn is_reopen_status(status: &str) -> bool {
    status == "in progress" || status == "reopen"
}

/// Map a raw record onto a transaction. `None` when it carries no id.
fn to_transaction(raw: JsonTransaction) -> Option<Transaction> {
    let transaction_id = blank_to_none(raw.transaction_id)?;
    let amount = |v: Option<String>| v.as_deref().and_then(parse_amount);
    let date = |v: Option<String>| v.as_deref().and_then(normalize_datetime);
    Some(Transaction {
        transaction_id,
        full_name: blank_to_none(raw.full_name),
        account_name: blank_to_none(raw.account_name),
        transaction_datetime: date(raw.transaction_date_time),
        transaction_type: raw.transaction_type.unwrap_or_default().trim().to_string(),
        transaction_status: raw
            .transaction_status
            .unwrap_or_default()
            .trim()
            .to_lowercase(),
        notes: blank_to_none(raw.notes),
        debit_amount: amount(raw.debit_amount),
        credit_amount: amount(raw.credit_amount),
        currency: blank_to_none(raw.currency),
        hold_amount: amount(raw.hold_amount),
        last_modified: date(raw.last_modified),
        parent_transaction_id: blank_to_none(raw.parent_transaction_id),
        child_transaction_ids: raw.child_transaction_ids.unwrap_or_default(),
        client_reference_number: blank_to_none(raw.client_reference_number),
        scheduled_transaction_id: blank_to_none(raw.scheduled_transaction_id),
        wallet_id: blank_to_none(raw.wallet_id),
        wallet_name1: blank_to_none(raw.wallet_name1),
        wallet_name2: blank_to_none(raw.wallet_name2),
        client_account_id: blank_to_none(raw.client_account_id),
        transaction_error_code: blank_to_none(raw.transaction_error_code),
        transaction_failure_reason: blank_to_none(raw.transaction_failure_reason),
        transaction_flag: blank_to_none(raw.transaction_flag),
        elinx_request_id: blank_to_none(raw.elinx_request_id),
        is_refunded: raw.is_refunded,
        is_refund: raw.is_refund,
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub inserted: usize,
    pub updated: usize,
    /// Updated records that were sent back for review.
    pub reopened: usize,
    pub skipped: usize,
    /// Same checksum as an earlier import.
    pub seen_before: bool,
}

pub fn import_file(conn: &Connection, file_path: &Path) -> Result<ImportResult> {
    let data = std::fs::read(file_path)?;
    let checksum = compute_checksum(&data);
    let seen_before = conn
        .prepare("SELECT 1 FROM imports WHERE checksum = ?1")?
        .exists([&checksum])?;

    let doc: ImportDocument = serde_json::from_slice(&data)?;
    let records = doc.transactions.unwrap_or_default();
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();

    let db_tx = conn.unchecked_transaction()?;
    let mut result = import_records(&db_tx, records)?;
    db_tx.execute(
        "INSERT INTO imports (filename, record_count, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![filename, (result.inserted + result.updated) as i64, checksum],
    )?;
    db_tx.commit()?;

    result.seen_before = seen_before;
    log::info!(
        "event=import file={filename} inserted={} updated={} reopened={} skipped={} seen_before={seen_before}",
        result.inserted,
        result.updated,
        result.reopened,
        result.skipped
    );
    Ok(result)
}

/// Apply parsed records. Callers own the surrounding SQL transaction.
pub fn import_records(conn: &Connection, records: Vec<JsonTransaction>) -> Result<ImportResult> {
    let mut result = ImportResult::default();
    for raw in records {
        if !is_imported_type(raw.transaction_type.as_deref()) {
            result.skipped += 1;
            continue;
        }
        let Some(mut tx) = to_transaction(raw) else {
            log::warn!("event=import_record status=skipped reason=missing_id");
            result.skipped += 1;
            continue;
        };

        match get_transaction(conn, &tx.transaction_id)? {
            None => {
                upsert_transaction(conn, &tx)?;
                result.inserted += 1;
            }
            Some(existing) => {
                tx.is_exception = existing.is_exception;
                tx.is_verifier = existing.is_verifier;
                upsert_transaction(conn, &tx)?;
                result.updated += 1;

                let processed = existing.is_prelevement_done || existing.is_nsf_done;
                if processed && is_reopen_status(&tx.transaction_status) {
                    reopen_transaction(conn, &tx.transaction_id)?;
                    result.reopened += 1;
                }
            }
        }
    }
    Ok(result)
}
