use std::path::PathBuf;

use chrono::NaiveDateTime;
use colored::Colorize;
use rusqlite::Connection;

use crate::archive::archive_csv_at;
use crate::batches::{last_batch, record_batch};
use crate::cli::{ids_of, open_db, resolve_selection, RenderOpts, Selection};
use crate::db::company_name;
use crate::error::{Result, TxError};
use crate::export::write_locked_csv;
use crate::models::Transaction;
use crate::queues::Queue;
use crate::render::write_reports;
use crate::reports::{build_reports, BatchReport};
use crate::settings::{shellexpand_path, Settings};
use crate::workflow::{get_transactions, process};

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn output_dir(settings: &Settings, opts: &RenderOpts) -> PathBuf {
    opts.output_dir
        .as_deref()
        .map(|d| PathBuf::from(shellexpand_path(d)))
        .unwrap_or_else(|| settings.reports_path())
}

/// Write rendered reports and record them as the latest batch.
fn write_and_record(
    conn: &Connection,
    settings: &Settings,
    queue: Queue,
    reports: &[BatchReport],
    opts: &RenderOpts,
    stamp: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    let paths = write_reports(
        reports,
        opts.format.unwrap_or_default(),
        &output_dir(settings, opts),
        stamp,
    )?;
    let printed: Vec<String> = reports
        .iter()
        .flat_map(|r| r.transaction_ids.iter().cloned())
        .collect();
    record_batch(conn, queue, &printed)?;
    Ok(paths)
}

fn print_paths(paths: &[PathBuf]) {
    for path in paths {
        println!("Wrote {}", path.display());
    }
}

/// Split a configured command line into program and arguments.
fn command_parts(command: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Start the configured post-NSF program without waiting for it.
fn run_post_nsf_command(command: &str) {
    let Some((program, args)) = command_parts(command) else {
        return;
    };
    match std::process::Command::new(program).args(&args).spawn() {
        Ok(child) => log::info!("event=post_nsf command={command} pid={}", child.id()),
        Err(e) => {
            log::warn!("event=post_nsf command={command} status=failed error={e}");
            eprintln!("{} could not start {program}: {e}", "Warning:".yellow());
        }
    }
}

fn export_and_archive(
    settings: &Settings,
    txs: &[Transaction],
    date_format: &str,
    stamp: NaiveDateTime,
) -> Result<PathBuf> {
    let csv_path = write_locked_csv(txs, &settings.nsf_output_path(), date_format, stamp)?;
    archive_csv_at(&csv_path, &settings.archive_path(), stamp)
}

/// Save a selection, then print it. NSF batches also produce the locked
/// CSV in the archive.
pub fn batch(selection: Selection, opts: RenderOpts) -> Result<()> {
    let (settings, conn) = open_db()?;
    let queue = selection.queue;
    let txs = resolve_selection(&conn, queue, &selection.ids, selection.all)?;
    let stamp = now();
    // fail on undated selections and a bad CSV date format before anything is saved
    let reports = build_reports(queue.into(), &txs, &company_name(&conn), stamp.date())?;
    let locked_format = match queue {
        Queue::Nsf => Some(settings.date_format()?),
        _ => None,
    };

    let updated = process(&conn, queue, &ids_of(&txs))?;
    println!("{} {updated} transaction(s) in {}", "Processed".green(), queue.label());

    if let Some(date_format) = locked_format {
        if let Some(command) = settings.post_nsf_command() {
            run_post_nsf_command(command);
        }
        match export_and_archive(&settings, &txs, date_format, stamp) {
            Ok(path) => println!("NSF file archived to {}", path.display()),
            Err(e) => {
                log::error!("event=batch queue=nsf step=export error={e}");
                eprintln!("{} NSF export/archive failed: {e}", "Error:".red());
            }
        }
    }

    let paths = write_and_record(&conn, &settings, queue, &reports, &opts, stamp)?;
    print_paths(&paths);
    Ok(())
}

/// Print a selection without touching its state.
pub fn print(selection: Selection, opts: RenderOpts) -> Result<()> {
    let (settings, conn) = open_db()?;
    let txs = resolve_selection(&conn, selection.queue, &selection.ids, selection.all)?;
    let stamp = now();
    let reports = build_reports(selection.queue.into(), &txs, &company_name(&conn), stamp.date())?;
    let paths = write_and_record(&conn, &settings, selection.queue, &reports, &opts, stamp)?;
    print_paths(&paths);
    Ok(())
}

pub fn reprint(opts: RenderOpts) -> Result<()> {
    let (settings, conn) = open_db()?;
    let batch = last_batch(&conn)?
        .ok_or_else(|| TxError::Other("Nothing has been printed yet.".to_string()))?;
    let txs = get_transactions(&conn, &batch.transaction_ids)?;
    let stamp = now();
    let reports = build_reports(batch.queue.into(), &txs, &company_name(&conn), stamp.date())?;
    let paths = write_reports(
        &reports,
        opts.format.unwrap_or_default(),
        &output_dir(&settings, &opts),
        stamp,
    )?;
    println!(
        "Reprinted batch #{} of {} ({}, {} transaction(s))",
        batch.id,
        batch.created_at,
        batch.queue.label(),
        txs.len()
    );
    print_paths(&paths);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parts_splits_arguments() {
        assert_eq!(
            command_parts("  /opt/credit/credit --nsf  auto "),
            Some(("/opt/credit/credit", vec!["--nsf", "auto"]))
        );
        assert_eq!(command_parts("notify"), Some(("notify", vec![])));
        assert_eq!(command_parts("   "), None);
    }
}
