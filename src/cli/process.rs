use colored::Colorize;

use crate::cli::{ids_of, open_db, resolve_selection, Selection};
use crate::error::Result;
use crate::workflow::process;

/// Save without printing.
pub fn run(selection: Selection) -> Result<()> {
    let (_settings, conn) = open_db()?;
    let txs = resolve_selection(&conn, selection.queue, &selection.ids, selection.all)?;
    let updated = process(&conn, selection.queue, &ids_of(&txs))?;
    println!(
        "{} {updated} transaction(s) in {}",
        "Processed".green(),
        selection.queue.label()
    );
    Ok(())
}
