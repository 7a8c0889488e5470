mod archive;
mod batches;
mod browser;
mod cli;
mod db;
mod error;
mod export;
mod fmt;
mod importer;
mod models;
mod queues;
mod render;
mod reports;
mod settings;
mod tui;
mod workflow;

use clap::Parser;
use pretty_env_logger::env_logger::{Builder, Env};

use cli::{Cli, Commands, ExportCommands};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let result = match cli.command {
        Commands::Init { data_dir, company } => cli::init::run(data_dir, company),
        Commands::Import { file } => cli::import::run(&file),
        Commands::Queue { queue } => cli::queue::run(queue),
        Commands::Status => cli::status::run(),
        Commands::Process { selection } => cli::process::run(selection),
        Commands::Batch { selection, render } => cli::batch::batch(selection, render),
        Commands::Print { selection, render } => cli::batch::print(selection, render),
        Commands::Reprint { render } => cli::batch::reprint(render),
        Commands::Export { command } => match command {
            ExportCommands::Nsf {
                ids,
                all,
                summary,
                output,
                date_format,
            } => cli::export::nsf(ids, all, summary, output, date_format),
        },
        Commands::Archive { file, archive_dir } => cli::archive::run(&file, archive_dir),
        Commands::Browse => cli::browse::run(),
        Commands::Backup { output } => cli::backup::run(output),
    };

    if let Err(e) = result {
        log::debug!("event=exit status=error error={e:?}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
