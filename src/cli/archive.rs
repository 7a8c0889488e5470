use std::path::PathBuf;

use crate::archive::archive_csv;
use crate::error::Result;
use crate::settings::{load_settings, shellexpand_path};

pub fn run(file: &str, archive_dir: Option<String>) -> Result<()> {
    let root = match archive_dir {
        Some(dir) => PathBuf::from(shellexpand_path(&dir)),
        None => load_settings().archive_path(),
    };
    let dest = archive_csv(&PathBuf::from(file), &root)?;
    println!("Archived to {}", dest.display());
    Ok(())
}
