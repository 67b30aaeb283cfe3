//! `migrata erase` command - Run the erase scripts.

use crate::cli::EraseArgs;
use crate::commands::{Session, with_service};
use crate::config::Settings;
use crate::error::CliResult;
use crate::output::{self, confirm, success};

/// Run the erase command
pub async fn run(args: EraseArgs, settings: &Settings) -> CliResult<()> {
    let options = settings.erase_options(&args)?;
    output::header("Erase");

    if !args.force {
        output::warn("The _erase scripts will run against the target database.");
        if !confirm("Continue?") {
            output::info("Erase cancelled");
            return Ok(());
        }
    }

    let mut session = Session::open(settings).await?;
    let workspace = settings.workspace();
    let report = with_service!(&mut session, svc => svc.erase(workspace, &options).await?);

    for script in &report.executed {
        output::list_item(script);
    }
    success(&format!(
        "Erase finished: {} scripts in {}ms",
        report.executed.len(),
        report.duration_ms
    ));
    Ok(())
}
