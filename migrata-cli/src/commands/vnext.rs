//! `migrata vnext` command - Create the next version directory.

use migrata_core::{VersionBump, Workspace};

use crate::cli::VnextArgs;
use crate::config::Settings;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the vnext command
pub async fn run(args: VnextArgs, settings: &Settings) -> CliResult<()> {
    let bump = if args.major {
        VersionBump::Major
    } else {
        VersionBump::Minor
    };

    let created = Workspace::new(settings.workspace())
        .create_next_version(bump, args.file.as_deref())
        .await?;

    success(&format!("Created {}", created.version));
    output::kv("Path", &created.path.display().to_string());
    if let Some(file) = &args.file {
        output::kv("Script", file);
    }

    Ok(())
}
