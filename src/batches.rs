use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::queues::Queue;

/// A recorded print run, kept so it can be reprinted later.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintBatch {
    pub id: i64,
    pub queue: Queue,
    pub created_at: String,
    pub transaction_ids: Vec<String>,
}

pub fn record_batch(conn: &Connection, queue: Queue, ids: &[String]) -> Result<i64> {
    let db_tx = conn.unchecked_transaction()?;
    db_tx.execute("INSERT INTO print_batches (kind) VALUES (?1)", [queue.key()])?;
    let batch_id = db_tx.last_insert_rowid();
    {
        let mut stmt = db_tx.prepare(
            "INSERT INTO print_batch_items (batch_id, position, transaction_id) VALUES (?1, ?2, ?3)",
        )?;
        for (pos, id) in ids.iter().enumerate() {
            stmt.execute(rusqlite::params![batch_id, pos as i64, id])?;
        }
    }
    db_tx.commit()?;
    log::info!("event=batch_record id={batch_id} queue={queue} items={}", ids.len());
    Ok(batch_id)
}

pub fn last_batch(conn: &Connection) -> Result<Option<PrintBatch>> {
    let head = conn
        .query_row(
            "SELECT id, kind, created_at FROM print_batches ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((id, kind, created_at)) = head else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT transaction_id FROM print_batch_items WHERE batch_id = ?1 ORDER BY position",
    )?;
    let transaction_ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    Ok(Some(PrintBatch {
        id,
        queue: kind.parse()?,
        created_at: created_at.unwrap_or_default(),
        transaction_ids,
    }))
}
