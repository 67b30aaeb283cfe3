//! `migrata version` command - Display version information.

use migrata_core::TOOL_VERSION;

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
const NAME: &str = env!("CARGO_PKG_NAME");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header("migrata");

    kv("Version", VERSION);
    kv("Binary", NAME);
    kv("Engine", TOOL_VERSION);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    let mut drivers = Vec::new();

    #[cfg(feature = "postgres")]
    drivers.push("postgresql");

    #[cfg(feature = "mysql")]
    drivers.push("mysql");

    #[cfg(feature = "mssql")]
    drivers.push("sqlserver");

    #[cfg(feature = "sqlite")]
    drivers.push("sqlite");

    kv("Drivers", &drivers.join(", "));

    output::newline();
    output::dim("https://github.com/pegasusheavy/migrata");

    Ok(())
}
