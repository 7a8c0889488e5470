use crate::browser::QueueBrowser;
use crate::cli::open_db;
use crate::error::Result;

pub fn run() -> Result<()> {
    let (_settings, conn) = open_db()?;
    let mut browser = QueueBrowser::new();
    browser.run(&conn)
}
