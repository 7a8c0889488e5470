use std::path::PathBuf;
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::Connection;

use crate::cli::open_db;
use crate::error::{Result, TxError};
use crate::fmt::format_bytes;
use crate::settings::{shellexpand_path, Settings};

const PAGES_PER_STEP: std::os::raw::c_int = 64;

fn default_backup_path(settings: &Settings) -> Result<PathBuf> {
    let dir = settings.data_path().join("backups");
    std::fs::create_dir_all(&dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(dir.join(format!("txdesk-{stamp}.db")))
}

/// Online copy of the live database; safe while other commands hold it open.
pub fn run(output: Option<String>) -> Result<()> {
    let (settings, conn) = open_db()?;
    let target = match output {
        Some(p) => PathBuf::from(shellexpand_path(&p)),
        None => default_backup_path(&settings)?,
    };
    if target == settings.db_path() {
        return Err(TxError::Other(
            "Refusing to back up the database onto itself".to_string(),
        ));
    }

    let mut copy = Connection::open(&target)?;
    Backup::new(&conn, &mut copy)?.run_to_completion(
        PAGES_PER_STEP,
        Duration::from_millis(5),
        None,
    )?;

    let bytes = std::fs::metadata(&target)?.len();
    log::info!("event=backup path={} bytes={bytes}", target.display());
    println!("Backup saved to {} ({})", target.display(), format_bytes(bytes));
    Ok(())
}
