use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TxError};
use crate::fmt::check_date_format;

pub const DB_FILE: &str = "txdesk.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Where locked-format NSF files are written before archiving.
    #[serde(default)]
    pub nsf_output_dir: String,
    #[serde(default)]
    pub archive_dir: String,
    #[serde(default)]
    pub reports_dir: String,
    /// chrono format for the date columns of the locked CSV.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Program started after an NSF batch has been saved, followed by its
    /// arguments, whitespace-separated (no shell quoting).
    #[serde(default)]
    pub post_nsf_command: Option<String>,
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            nsf_output_dir: String::new(),
            archive_dir: String::new(),
            reports_dir: String::new(),
            date_format: default_date_format(),
            post_nsf_command: None,
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join(DB_FILE)
    }

    pub fn nsf_output_path(&self) -> PathBuf {
        or_default(&self.nsf_output_dir, || self.data_path().join("output").join("nsf"))
    }

    pub fn archive_path(&self) -> PathBuf {
        or_default(&self.archive_dir, || self.data_path().join("archive"))
    }

    pub fn reports_path(&self) -> PathBuf {
        or_default(&self.reports_dir, || self.data_path().join("reports"))
    }

    /// Locked-CSV date format, checked so a bad value fails before any
    /// state is written.
    pub fn date_format(&self) -> Result<&str> {
        let fmt = if self.date_format.trim().is_empty() {
            "%Y-%m-%d"
        } else {
            &self.date_format
        };
        check_date_format(fmt)?;
        Ok(fmt)
    }

    pub fn post_nsf_command(&self) -> Option<&str> {
        self.post_nsf_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Blank configured paths fall back to a location under the data dir.
fn or_default(configured: &str, fallback: impl FnOnce() -> PathBuf) -> PathBuf {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        PathBuf::from(trimmed)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("txdesk")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("txdesk")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(path).unwrap_or_default();
    match serde_json::from_str::<Settings>(&content) {
        Ok(settings) => {
            if let Err(e) = settings.date_format() {
                log::warn!("event=settings_load path={} error={e}", path.display());
            }
            settings
        }
        Err(e) => {
            log::warn!("event=settings_load status=invalid path={} error={e}", path.display());
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(config_dir())?;
    save_settings_to(settings, &settings_path())
}

fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TxError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
