//! `migrata run` and `migrata verify` commands.

use migrata_core::{MigrationPlan, RunReport, RunStatus, ScriptAction};

use crate::cli::RunArgs;
use crate::commands::{Session, with_service};
use crate::config::Settings;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the run command
pub async fn run(args: RunArgs, settings: &Settings) -> CliResult<()> {
    let options = settings.run_options(&args)?;
    output::header("Run migrations");
    print_target(settings);

    let mut session = Session::open(settings).await?;
    let workspace = settings.workspace();
    let report = with_service!(&mut session, svc => svc.run(workspace, &options).await?);

    print_report(&report);
    Ok(())
}

/// Run the verify command
pub async fn verify(args: RunArgs, settings: &Settings) -> CliResult<()> {
    let options = settings.run_options(&args)?;
    output::header("Verify migrations");
    print_target(settings);

    let mut session = Session::open(settings).await?;
    let workspace = settings.workspace();
    let report = with_service!(&mut session, svc => svc.verify(workspace, &options).await?);

    print_report(&report);
    Ok(())
}

fn print_target(settings: &Settings) {
    output::kv("Platform", &settings.platform().to_string());
    output::kv("Workspace", &settings.workspace().display().to_string());
    if let Some(source) = &settings.source {
        output::kv("Config", &source.display().to_string());
    }
    output::newline();
}

fn print_plan(plan: &MigrationPlan) {
    for version in &plan.versions {
        let suffix = if version.resumed { " (resumed)" } else { "" };
        output::section(&format!("{}{}", version.version, suffix));
        for planned in &version.scripts {
            let label = match planned.action {
                ScriptAction::Execute => output::style_pending("run"),
                ScriptAction::Reapply => output::style_error("re-run"),
                ScriptAction::SkipApplied => output::style_success("applied"),
            };
            output::list_item(&format!("{} {}", planned.script.entry.id, label));
        }
    }
}

fn print_report(report: &RunReport) {
    match report.status {
        RunStatus::NothingToApply => {
            output::info("Nothing to apply, the database is up to date");
        }
        RunStatus::Verified => {
            print_plan(&report.plan);
            output::newline();
            success(&report.summary());
        }
        RunStatus::Applied => {
            for version in &report.versions {
                output::section(&version.version);
                for script in &version.executed {
                    output::list_item(script);
                }
                if !version.skipped.is_empty() {
                    output::dim(&format!(
                        "  {} already applied: {}",
                        version.skipped.len(),
                        version.skipped.join(", ")
                    ));
                }
            }
            output::newline();
            success(&report.summary());
        }
    }
}
