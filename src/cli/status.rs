use crate::db::{company_name, get_connection, init_db};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::queues::{queue_counts, Queue};
use crate::settings::{load_settings, settings_file_exists};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    let source = if settings_file_exists() { "" } else { " (defaults)" };
    println!("Data dir:   {}{source}", settings.data_path().display());
    println!("Database:   {}", db_path.display());
    println!("NSF output: {}", settings.nsf_output_path().display());
    println!("Archive:    {}", settings.archive_path().display());
    println!("Reports:    {}", settings.reports_path().display());
    println!(
        "Post-NSF:   {}",
        settings.post_nsf_command().unwrap_or("(none)")
    );

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `txdesk init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    println!("Company:    {}", company_name(&conn));

    let counts = queue_counts(&conn)?;
    println!();
    for queue in Queue::ALL {
        println!("{:<14}{}", format!("{}:", queue.label()), counts.get(queue));
    }
    println!("{:<14}{}", "Transactions:", counts.total);
    Ok(())
}
