use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Result, TxError};

/// Move an exported file into `root/yyyyMMdd/`. Returns the new path.
pub fn archive_csv(path: &Path, root: &Path) -> Result<PathBuf> {
    archive_csv_at(path, root, chrono::Local::now().naive_local())
}

pub fn archive_csv_at(path: &Path, root: &Path, now: NaiveDateTime) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(TxError::Other(format!("File not found: {}", path.display())));
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| TxError::Other(format!("Not a file: {}", path.display())))?;

    let day_dir = root.join(now.format("%Y%m%d").to_string());
    std::fs::create_dir_all(&day_dir)?;

    let mut target = day_dir.join(file_name);
    if target.exists() {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("export");
        let stamp = now.format("%H%M%S");
        let name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}_{stamp}.{ext}"),
            None => format!("{stem}_{stamp}"),
        };
        target = day_dir.join(name);
    }

    move_file(path, &target)?;
    log::info!("event=archive from={} to={}", path.display(), target.display());
    Ok(target)
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)?;
    Ok(())
}
