use std::path::PathBuf;

use crate::cli::{open_db, resolve_selection};
use crate::error::Result;
use crate::export::{locked_csv_bytes, locked_file_name, write_summary_csv};
use crate::queues::Queue;
use crate::settings::shellexpand_path;

pub fn nsf(
    ids: Vec<String>,
    all: bool,
    summary: bool,
    output: Option<String>,
    date_format: Option<String>,
) -> Result<()> {
    let (settings, conn) = open_db()?;
    let locked_format = match date_format.as_deref() {
        Some(f) => f,
        None if summary => "",
        None => settings.date_format()?,
    };
    let txs = resolve_selection(&conn, Queue::Nsf, &ids, all)?;
    let now = chrono::Local::now().naive_local();

    let path = match output {
        Some(p) => PathBuf::from(shellexpand_path(&p)),
        None if summary => settings
            .nsf_output_path()
            .join(format!("NSF_resume_{}.csv", now.format("%Y%m%d_%H%M%S"))),
        None => settings.nsf_output_path().join(locked_file_name(now)),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if summary {
        write_summary_csv(&txs, &path)?;
    } else {
        std::fs::write(&path, locked_csv_bytes(&txs, locked_format)?)?;
        log::info!("event=export format=locked rows={} path={}", txs.len(), path.display());
    }
    println!("Exported {} transaction(s) to {}", txs.len(), path.display());
    Ok(())
}
