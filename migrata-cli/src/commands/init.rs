//! `migrata init` command - Create a migration workspace.

use migrata_core::Workspace;

use crate::config::{CONFIG_FILE_NAME, CONFIG_TEMPLATE, Settings};
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the init command
pub async fn run(settings: &Settings) -> CliResult<()> {
    output::header("Initialize migrata workspace");

    let workspace = Workspace::scaffold(settings.workspace()).await?;
    let root = workspace.root();

    let config_path = root.join(CONFIG_FILE_NAME);
    if tokio::fs::try_exists(&config_path).await? {
        output::warn(&format!("{} already exists, leaving it unchanged", CONFIG_FILE_NAME));
    } else {
        tokio::fs::write(&config_path, CONFIG_TEMPLATE).await?;
    }

    for entry in ["_init", "_pre", "v0.00", "_post", "_erase", CONFIG_FILE_NAME] {
        output::list_item(&root.join(entry).display().to_string());
    }
    output::newline();
    success(&format!("Workspace ready at {}", root.display()));
    output::dim("Next: add scripts to v0.00 and run `migrata run`");

    Ok(())
}
