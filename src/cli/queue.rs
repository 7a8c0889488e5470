use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::{format_date, money_fr};
use crate::queues::{list_queue, Queue};

pub fn run(queue: Queue) -> Result<()> {
    let (_settings, conn) = open_db()?;
    let rows = list_queue(&conn, queue)?;

    if rows.is_empty() {
        println!("{}: no transactions.", queue.label());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "TransactionID",
        "# Client",
        "Nom",
        "Montant",
        "Transmis Le",
        "Modifié",
        "Statut",
        "Raison",
    ]);
    for tx in &rows {
        table.add_row(vec![
            Cell::new(&tx.transaction_id),
            Cell::new(tx.client_ref()),
            Cell::new(tx.display_name()),
            Cell::new(tx.credit_amount.map(money_fr).unwrap_or_default())
                .set_alignment(CellAlignment::Right),
            Cell::new(format_date(tx.transaction_datetime.as_deref(), "%d-%m-%Y")),
            Cell::new(format_date(tx.last_modified.as_deref(), "%d-%m-%Y")),
            Cell::new(&tx.transaction_status),
            Cell::new(tx.transaction_failure_reason.as_deref().unwrap_or("")),
        ]);
    }

    let total: f64 = rows.iter().filter_map(|t| t.credit_amount).sum();
    println!("{} ({})\n{table}", queue.label(), rows.len());
    println!("Total: {}", money_fr(total));
    Ok(())
}
