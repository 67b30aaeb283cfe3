//! `migrata list` command - Show the ledger.

use migrata_core::{LedgerRecord, ScriptStatus};

use crate::cli::ListArgs;
use crate::commands::{Session, with_service};
use crate::config::Settings;
use crate::error::CliResult;
use crate::output;

/// Run the list command
pub async fn run(args: ListArgs, settings: &Settings) -> CliResult<()> {
    let options = settings.list_options(&args)?;
    let mut session = Session::open(settings).await?;
    let records = with_service!(&mut session, svc => svc.list(&options).await?);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    output::header("Applied versions");
    if records.is_empty() {
        output::info("The ledger is empty");
        return Ok(());
    }

    for record in &records {
        output::list_item(&describe(record));
    }
    Ok(())
}

fn describe(record: &LedgerRecord) -> String {
    let status = match record.status {
        ScriptStatus::Succeeded => output::style_success(record.status.as_str()),
        ScriptStatus::Failed => output::style_error(record.status.as_str()),
        ScriptStatus::InProgress => output::style_pending(record.status.as_str()),
    };
    let target = if record.is_version_marker() {
        record.version.clone()
    } else {
        format!("{}/{}", record.version, record.script)
    };

    let mut line = format!(
        "{} {} {} by {} ({}ms)",
        record.applied_on.format("%Y-%m-%d %H:%M:%S"),
        target,
        status,
        record.applied_by_user.as_deref().unwrap_or("unknown"),
        record.duration_ms
    );
    if let Some(message) = &record.error_message {
        line.push_str(&format!(": {message}"));
    }
    line
}
