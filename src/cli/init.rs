use colored::Colorize;

use crate::db::{company_name, get_connection, init_db, set_metadata};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, company: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    save_settings(&settings)?;

    let resolved = settings.data_path();
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("imports"))?;
    std::fs::create_dir_all(settings.nsf_output_path())?;
    std::fs::create_dir_all(settings.archive_path())?;
    std::fs::create_dir_all(settings.reports_path())?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    if let Some(name) = company.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        set_metadata(&conn, "company_name", name)?;
    }

    log::info!("event=init data_dir={}", resolved.display());
    println!("{} txdesk at {}", "Initialized".green(), resolved.display());
    println!("Company: {}", company_name(&conn));
    Ok(())
}
