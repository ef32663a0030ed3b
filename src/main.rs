use clap::Parser;
use color_eyre::Result;
use research_desk::{
    Config, Database, Profile,
    cli::{self, Cli, Commands},
    logging,
};
use std::path::Path;

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // --dev uses a separate config and database
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(Path::new(path))?,
        None => Config::load_with_profile(profile)?,
    };

    logging::init(&config.log_level);

    let db_path = config.get_database_path();
    let mut db = Database::new(
        db_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?,
    )?;
    tracing::debug!(?profile, db = %db_path.display(), "starting");

    let command = cli.command.unwrap_or(Commands::List {
        status: None,
        role: None,
        journal: None,
        json: false,
    });

    match command {
        Commands::List { status, role, journal, json } => {
            cli::handle_list(status, role, journal, json, &config, &db)?;
        }
        Commands::Add { title, status, role, journal } => {
            cli::handle_add(title, status, role, journal, &db)?;
        }
        Commands::SetStatus { id, status } => {
            cli::handle_set_status(id, status, &db)?;
        }
        Commands::Log { id, label, date } => {
            cli::handle_log(id, label, date, &mut db)?;
        }
        Commands::LogEdit { entry_id, label, date } => {
            cli::handle_log_edit(entry_id, label, date, &mut db)?;
        }
        Commands::LogDelete { entry_id } => {
            cli::handle_log_delete(entry_id, &mut db)?;
        }
        Commands::Todo { id } => {
            cli::handle_todo(id, &config, &mut db)?;
        }
        Commands::TodoEdit { id, priority, notes } => {
            cli::handle_todo_edit(id, priority, notes, &config, &mut db)?;
        }
        Commands::Delete { id } => {
            cli::handle_delete(id, &db)?;
        }
    }

    Ok(())
}
