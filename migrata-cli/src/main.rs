//! migrata CLI - Command-line interface for versioned database migrations.

use clap::Parser;
use miette::Diagnostic;

use migrata_cli::cli::Cli;
use migrata_cli::{logging, output};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.debug);

    if let Err(e) = migrata_cli::execute(cli).await {
        output::newline();
        output::error(&e.to_string());
        if let Some(help) = e.help() {
            output::hint(&help.to_string());
        }
        std::process::exit(1);
    }
}
