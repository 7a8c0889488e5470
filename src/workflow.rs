use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, TxError};
use crate::models::Transaction;
use crate::queues::Queue;

pub const TX_SELECT: &str = "SELECT transaction_id, full_name, account_name, transaction_datetime, \
     transaction_type, transaction_status, notes, debit_amount, credit_amount, currency, \
     hold_amount, last_modified, parent_transaction_id, child_transaction_ids, \
     client_reference_number, scheduled_transaction_id, wallet_id, wallet_name1, wallet_name2, \
     client_account_id, transaction_error_code, transaction_failure_reason, transaction_flag, \
     elinx_request_id, is_refunded, is_refund, is_prelevement_done, is_nsf_done, is_exception, \
     is_verifier FROM transactions";

/// Child ids are stored as a JSON array; older rows may hold a comma list.
fn decode_children(raw: Option<String>) -> Vec<String> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|_| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

fn encode_children(ids: &[String]) -> Option<String> {
    if ids.is_empty() {
        None
    } else {
        serde_json::to_string(ids).ok()
    }
}

pub fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        transaction_id: row.get("transaction_id")?,
        full_name: row.get("full_name")?,
        account_name: row.get("account_name")?,
        transaction_datetime: row.get("transaction_datetime")?,
        transaction_type: row.get("transaction_type")?,
        transaction_status: row.get("transaction_status")?,
        notes: row.get("notes")?,
        debit_amount: row.get("debit_amount")?,
        credit_amount: row.get("credit_amount")?,
        currency: row.get("currency")?,
        hold_amount: row.get("hold_amount")?,
        last_modified: row.get("last_modified")?,
        parent_transaction_id: row.get("parent_transaction_id")?,
        child_transaction_ids: decode_children(row.get("child_transaction_ids")?),
        client_reference_number: row.get("client_reference_number")?,
        scheduled_transaction_id: row.get("scheduled_transaction_id")?,
        wallet_id: row.get("wallet_id")?,
        wallet_name1: row.get("wallet_name1")?,
        wallet_name2: row.get("wallet_name2")?,
        client_account_id: row.get("client_account_id")?,
        transaction_error_code: row.get("transaction_error_code")?,
        transaction_failure_reason: row.get("transaction_failure_reason")?,
        transaction_flag: row.get("transaction_flag")?,
        elinx_request_id: row.get("elinx_request_id")?,
        is_refunded: row.get("is_refunded")?,
        is_refund: row.get("is_refund")?,
        is_prelevement_done: row.get("is_prelevement_done")?,
        is_nsf_done: row.get("is_nsf_done")?,
        is_exception: row.get("is_exception")?,
        is_verifier: row.get("is_verifier")?,
    })
}

pub fn get_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    let sql = format!("{TX_SELECT} WHERE transaction_id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_transaction).optional()?)
}

/// Fetch `ids` in the order given. Any unknown id fails the whole call.
pub fn get_transactions(conn: &Connection, ids: &[String]) -> Result<Vec<Transaction>> {
    ids.iter()
        .map(|id| get_transaction(conn, id)?.ok_or_else(|| TxError::UnknownTransaction(id.clone())))
        .collect()
}

/// Insert a new transaction or refresh an existing one. The done flags are
/// left alone on update.
pub fn upsert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (transaction_id, full_name, account_name, transaction_datetime, \
            transaction_type, transaction_status, notes, debit_amount, credit_amount, currency, \
            hold_amount, last_modified, parent_transaction_id, child_transaction_ids, \
            client_reference_number, scheduled_transaction_id, wallet_id, wallet_name1, \
            wallet_name2, client_account_id, transaction_error_code, transaction_failure_reason, \
            transaction_flag, elinx_request_id, is_refunded, is_refund, is_prelevement_done, \
            is_nsf_done, is_exception, is_verifier) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
            ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, 0, 0, ?27, ?28) \
         ON CONFLICT(transaction_id) DO UPDATE SET \
            full_name = excluded.full_name, \
            account_name = excluded.account_name, \
            transaction_datetime = excluded.transaction_datetime, \
            transaction_type = excluded.transaction_type, \
            transaction_status = excluded.transaction_status, \
            notes = excluded.notes, \
            debit_amount = excluded.debit_amount, \
            credit_amount = excluded.credit_amount, \
            currency = excluded.currency, \
            hold_amount = excluded.hold_amount, \
            last_modified = excluded.last_modified, \
            parent_transaction_id = excluded.parent_transaction_id, \
            child_transaction_ids = excluded.child_transaction_ids, \
            client_reference_number = excluded.client_reference_number, \
            scheduled_transaction_id = excluded.scheduled_transaction_id, \
            wallet_id = excluded.wallet_id, \
            wallet_name1 = excluded.wallet_name1, \
            wallet_name2 = excluded.wallet_name2, \
            client_account_id = excluded.client_account_id, \
            transaction_error_code = excluded.transaction_error_code, \
            transaction_failure_reason = excluded.transaction_failure_reason, \
            transaction_flag = excluded.transaction_flag, \
            elinx_request_id = excluded.elinx_request_id, \
            is_refunded = excluded.is_refunded, \
            is_refund = excluded.is_refund, \
            is_exception = excluded.is_exception, \
            is_verifier = excluded.is_verifier",
        params![
            tx.transaction_id,
            tx.full_name,
            tx.account_name,
            tx.transaction_datetime,
            tx.transaction_type,
            tx.transaction_status,
            tx.notes,
            tx.debit_amount,
            tx.credit_amount,
            tx.currency,
            tx.hold_amount,
            tx.last_modified,
            tx.parent_transaction_id,
            encode_children(&tx.child_transaction_ids),
            tx.client_reference_number,
            tx.scheduled_transaction_id,
            tx.wallet_id,
            tx.wallet_name1,
            tx.wallet_name2,
            tx.client_account_id,
            tx.transaction_error_code,
            tx.transaction_failure_reason,
            tx.transaction_flag,
            tx.elinx_request_id,
            tx.is_refunded,
            tx.is_refund,
            tx.is_exception,
            tx.is_verifier,
        ],
    )?;
    Ok(())
}

/// Send a processed transaction back for review: done flags cleared,
/// flagged as an exception, verification reset.
pub fn reopen_transaction(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET is_prelevement_done = 0, is_nsf_done = 0, \
         is_exception = 1, is_verifier = 0 WHERE transaction_id = ?1",
        [id],
    )?;
    log::info!("event=reopen transaction_id={id}");
    Ok(())
}

fn apply_each(conn: &Connection, sql: &str, ids: &[String]) -> Result<usize> {
    let mut stmt = conn.prepare(sql)?;
    let mut changed = 0;
    for id in ids {
        changed += stmt.execute([id])?;
    }
    Ok(changed)
}

fn update_each(conn: &Connection, sql: &str, ids: &[String]) -> Result<usize> {
    let db_tx = conn.unchecked_transaction()?;
    let changed = apply_each(&db_tx, sql, ids)?;
    db_tx.commit()?;
    Ok(changed)
}

pub fn mark_prelevement_done(conn: &Connection, ids: &[String]) -> Result<usize> {
    let changed = update_each(
        conn,
        "UPDATE transactions SET is_prelevement_done = 1 WHERE transaction_id = ?1",
        ids,
    )?;
    log::info!("event=process queue=prelevements requested={} updated={changed}", ids.len());
    Ok(changed)
}

/// All-or-nothing: every id must already be debit-processed. The check and
/// the update share one SQL transaction.
pub fn mark_nsf_done(conn: &Connection, ids: &[String]) -> Result<usize> {
    let db_tx = conn.unchecked_transaction()?;
    let not_debited: Vec<String> = get_transactions(&db_tx, ids)?
        .into_iter()
        .filter(|t| !t.is_prelevement_done)
        .map(|t| t.transaction_id)
        .collect();
    if !not_debited.is_empty() {
        log::warn!("event=process queue=nsf status=refused not_debited={}", not_debited.len());
        return Err(TxError::NotDebited(not_debited));
    }
    let changed = apply_each(
        &db_tx,
        "UPDATE transactions SET is_nsf_done = 1 WHERE transaction_id = ?1",
        ids,
    )?;
    db_tx.commit()?;
    log::info!("event=process queue=nsf requested={} updated={changed}", ids.len());
    Ok(changed)
}

pub fn verify_exceptions(conn: &Connection, ids: &[String]) -> Result<usize> {
    let changed = update_each(
        conn,
        "UPDATE transactions SET is_verifier = 1, is_exception = 0 WHERE transaction_id = ?1",
        ids,
    )?;
    log::info!("event=process queue=exceptions requested={} updated={changed}", ids.len());
    Ok(changed)
}

/// The "save" action of a queue.
pub fn process(conn: &Connection, queue: Queue, ids: &[String]) -> Result<usize> {
    if ids.is_empty() {
        return Err(TxError::EmptySelection);
    }
    match queue {
        Queue::Prelevements => mark_prelevement_done(conn, ids),
        Queue::Nsf => mark_nsf_done(conn, ids),
        Queue::Exceptions => verify_exceptions(conn, ids),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::queues::{classify, list_queue};

    fn tx(id: &str, status: &str) -> Transaction {
        Transaction {
            transaction_id: id.to_string(),
            full_name: Some("Marie Tremblay".into()),
            transaction_type: "EFT Funding".into(),
            transaction_status: status.to_string(),
            credit_amount: Some(144.0),
            transaction_datetime: Some("2024-12-13 10:05:46".into()),
            last_modified: Some("2024-12-14 08:00:00".into()),
            child_transaction_ids: vec!["c1".into(), "c2".into()],
            ..Default::default()
        }
    }

    fn s(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_upsert_then_get_roundtrips_fields() {
        let (_dir, conn) = test_db();
        let t = tx("T1", "completed");
        upsert_transaction(&conn, &t).unwrap();
        assert_eq!(get_transaction(&conn, "T1").unwrap(), Some(t));
        assert_eq!(get_transaction(&conn, "nope").unwrap(), None);
    }

    #[test]
    fn test_upsert_preserves_done_flags() {
        let (_dir, conn) = test_db();
        upsert_transaction(&conn, &tx("T1", "completed")).unwrap();
        mark_prelevement_done(&conn, &s(&["T1"])).unwrap();

        let mut refreshed = tx("T1", "failed");
        refreshed.credit_amount = Some(200.0);
        refreshed.is_prelevement_done = false;
        upsert_transaction(&conn, &refreshed).unwrap();

        let stored = get_transaction(&conn, "T1").unwrap().unwrap();
        assert!(stored.is_prelevement_done);
        assert_eq!(stored.transaction_status, "failed");
        assert_eq!(stored.credit_amount, Some(200.0));
    }

    #[test]
    fn test_legacy_comma_children_decode() {
        assert_eq!(decode_children(Some("a, b,,c".into())), vec!["a", "b", "c"]);
        assert!(decode_children(Some("  ".into())).is_empty());
        assert!(decode_children(None).is_empty());
    }

    #[test]
    fn test_get_transactions_keeps_order_and_rejects_unknown() {
        let (_dir, conn) = test_db();
        upsert_transaction(&conn, &tx("A", "completed")).unwrap();
        upsert_transaction(&conn, &tx("B", "completed")).unwrap();
        let rows = get_transactions(&conn, &s(&["B", "A"])).unwrap();
        assert_eq!(rows[0].transaction_id, "B");
        assert_eq!(rows[1].transaction_id, "A");
        assert!(matches!(
            get_transactions(&conn, &s(&["A", "Z"])),
            Err(TxError::UnknownTransaction(id)) if id == "Z"
        ));
    }

    #[test]
    fn test_nsf_refused_when_any_not_debited() {
        let (_dir, conn) = test_db();
        upsert_transaction(&conn, &tx("A", "failed")).unwrap();
        upsert_transaction(&conn, &tx("B", "failed")).unwrap();
        mark_prelevement_done(&conn, &s(&["A"])).unwrap();

        let err = mark_nsf_done(&conn, &s(&["A", "B"])).unwrap_err();
        assert!(matches!(err, TxError::NotDebited(ref ids) if ids == &s(&["B"])));
        assert!(!get_transaction(&conn, "A").unwrap().unwrap().is_nsf_done);

        assert_eq!(mark_nsf_done(&conn, &s(&["A"])).unwrap(), 1);
        let a = get_transaction(&conn, "A").unwrap().unwrap();
        assert!(a.is_nsf_done);
        assert_eq!(classify(&a), None);
    }

    #[test]
    fn test_nsf_refusal_rolls_back_and_releases_transaction() {
        let (_dir, conn) = test_db();
        upsert_transaction(&conn, &tx("A", "failed")).unwrap();
        upsert_transaction(&conn, &tx("B", "failed")).unwrap();
        mark_prelevement_done(&conn, &s(&["A"])).unwrap();

        assert!(mark_nsf_done(&conn, &s(&["A", "B"])).is_err());
        assert!(mark_nsf_done(&conn, &s(&["A", "Z"])).is_err());
        assert!(conn.is_autocommit());
        assert!(!get_transaction(&conn, "A").unwrap().unwrap().is_nsf_done);
        assert_eq!(list_queue(&conn, Queue::Nsf).unwrap().len(), 1);
    }

    #[test]
    fn test_verify_exception_clears_it() {
        let (_dir, conn) = test_db();
        let mut e = tx("E", "completed");
        e.is_exception = true;
        upsert_transaction(&conn, &e).unwrap();
        upsert_transaction(&conn, &tx("C", "cancelled")).unwrap();
        assert_eq!(list_queue(&conn, Queue::Exceptions).unwrap().len(), 2);

        assert_eq!(process(&conn, Queue::Exceptions, &s(&["E", "C"])).unwrap(), 2);
        assert!(list_queue(&conn, Queue::Exceptions).unwrap().is_empty());
        let e = get_transaction(&conn, "E").unwrap().unwrap();
        assert!(e.is_verifier && !e.is_exception);
        // verified but never debited
        assert_eq!(classify(&e), Some(Queue::Prelevements));
    }

    #[test]
    fn test_reopen_returns_to_exceptions() {
        let (_dir, conn) = test_db();
        upsert_transaction(&conn, &tx("R", "completed")).unwrap();
        mark_prelevement_done(&conn, &s(&["R"])).unwrap();
        conn.execute("UPDATE transactions SET is_verifier = 1 WHERE transaction_id = 'R'", [])
            .unwrap();
        reopen_transaction(&conn, "R").unwrap();
        let r = get_transaction(&conn, "R").unwrap().unwrap();
        assert!(!r.is_prelevement_done && !r.is_nsf_done && !r.is_verifier);
        assert_eq!(classify(&r), Some(Queue::Exceptions));
    }

    #[test]
    fn test_process_empty_selection() {
        let (_dir, conn) = test_db();
        assert!(matches!(process(&conn, Queue::Nsf, &[]), Err(TxError::EmptySelection)));
    }
}
