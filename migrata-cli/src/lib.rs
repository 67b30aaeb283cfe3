//! migrata CLI - Command-line interface for versioned database migrations.
//!
//! This crate provides the `migrata` binary: workspace scaffolding
//! (`init`, `vnext`), applying and verifying versions (`run`, `verify`),
//! inspecting the ledger (`list`) and running erase scripts (`erase`).

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

use cli::{Cli, Command};
use config::Settings;
use error::CliResult;

/// Execute a parsed command line.
pub async fn execute(cli: Cli) -> CliResult<()> {
    let settings = Settings::load(&cli.global).await?;

    match cli.command {
        Command::Init => commands::init::run(&settings).await,
        Command::Vnext(args) => commands::vnext::run(args, &settings).await,
        Command::Run(args) => commands::run::run(args, &settings).await,
        Command::Verify(args) => commands::run::verify(args, &settings).await,
        Command::List(args) => commands::list::run(args, &settings).await,
        Command::Erase(args) => commands::erase::run(args, &settings).await,
        Command::Version => commands::version::run().await,
    }
}
