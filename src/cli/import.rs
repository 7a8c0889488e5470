use std::path::PathBuf;

use colored::Colorize;

use crate::cli::open_db;
use crate::error::Result;
use crate::importer::import_file;

pub fn run(file: &str) -> Result<()> {
    let file_path = PathBuf::from(file);
    let (_settings, conn) = open_db()?;

    let result = import_file(&conn, &file_path)?;

    if result.seen_before {
        println!(
            "{}",
            "Note: this file was imported before (same checksum); records refreshed.".yellow()
        );
    }
    println!(
        "{} inserted, {} updated, {} skipped",
        result.inserted, result.updated, result.skipped
    );
    if result.reopened > 0 {
        println!(
            "{}",
            format!("{} reopened transaction(s) moved to Exceptions", result.reopened).yellow()
        );
    }
    Ok(())
}
