#[cfg(feature = "pdf")]
pub mod pdf;
pub mod text;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Result, TxError};
use crate::reports::BatchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Pdf,
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        if cfg!(feature = "pdf") {
            Self::Pdf
        } else {
            Self::Text
        }
    }
}

pub fn report_file_name(report: &BatchReport, format: OutputFormat, now: NaiveDateTime) -> String {
    let stamp = now.format("%Y%m%d_%H%M%S");
    match report.group_date {
        Some(date) => format!(
            "{}_{}_{stamp}.{}",
            report.kind.key(),
            date.format("%Y%m%d"),
            format.extension()
        ),
        None => format!("{}_{stamp}.{}", report.kind.key(), format.extension()),
    }
}

pub fn render_bytes(report: &BatchReport, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Text => Ok(text::render(report).into_bytes()),
        #[cfg(feature = "pdf")]
        OutputFormat::Pdf => pdf::render(report),
        #[cfg(not(feature = "pdf"))]
        OutputFormat::Pdf => Err(TxError::Other(
            "PDF output is not available in this build, use --format text".to_string(),
        )),
    }
}

/// Write every report into `dir`. Returns the written paths in order.
pub fn write_reports(
    reports: &[BatchReport],
    format: OutputFormat,
    dir: &Path,
    now: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    if reports.is_empty() {
        return Err(TxError::EmptySelection);
    }
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(reports.len());
    for report in reports {
        let path = dir.join(report_file_name(report, format, now));
        std::fs::write(&path, render_bytes(report, format)?)?;
        log::info!(
            "event=render kind={} rows={} path={}",
            report.kind.key(),
            report.rows.len(),
            path.display()
        );
        written.push(path);
    }
    Ok(written)
}
