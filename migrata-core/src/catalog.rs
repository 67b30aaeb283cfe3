//! Script discovery, classification and checksums.
//!
//! File names are split on `.`: the last segment is the extension, the first
//! is the base name and the segments in between are markers.
//!
//! | File                        | Kind        | Notes                           |
//! |-----------------------------|-------------|---------------------------------|
//! | `01_tables.sql`             | run         |                                 |
//! | `00_setup.pre.sql`          | pre-run     | before every run script         |
//! | `99_grants.post.sql`        | post-run    | after every run script          |
//! | `02_seed.env-dev.sql`       | run         | only when the environment is `dev` |
//! | `dbo.visitor.csv`           | bulk-import | loads table `dbo.visitor`       |
//!
//! Files with any other extension are ignored, as are hidden entries.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{MigrateResult, MigrationError};

/// How a script is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// SQL run before the other scripts of its directory.
    PreRun,
    /// Plain SQL script.
    Run,
    /// SQL run after the other scripts of its directory.
    PostRun,
    /// CSV data loaded into a table.
    BulkImport,
    /// SQL teardown script.
    Erase,
}

impl ScriptKind {
    fn group(&self) -> u8 {
        match self {
            Self::PreRun => 0,
            Self::Run | Self::BulkImport | Self::Erase => 1,
            Self::PostRun => 2,
        }
    }
}

/// Which kind of directory a catalog is built from. Controls classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// A version directory, or `_init`.
    Version,
    /// `_pre`: every SQL file is pre-run.
    Pre,
    /// `_post`: every SQL file is post-run.
    Post,
    /// `_erase`: every SQL file is an erase script; data files are ignored.
    Erase,
}

/// Target table of a bulk-import script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkTarget {
    /// Schema, when the file name carries one.
    pub schema: Option<String>,
    /// Table name.
    pub table: String,
}

impl std::fmt::Display for BulkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => f.write_str(&self.table),
        }
    }
}

/// One executable unit discovered on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptEntry {
    /// Path relative to the catalog directory, `/`-separated.
    pub id: String,
    /// Path on disk.
    pub path: PathBuf,
    /// Execution kind.
    pub kind: ScriptKind,
    /// Environment tags (lowercase). Empty means the script always runs.
    pub environments: Vec<String>,
    /// Position in execution order.
    pub ordinal: usize,
    /// Table for bulk-import scripts.
    pub bulk_target: Option<BulkTarget>,
}

impl ScriptEntry {
    /// Whether the script runs in the given environment.
    pub fn matches_environment(&self, environment: Option<&str>) -> bool {
        if self.environments.is_empty() {
            return true;
        }
        environment.is_some_and(|env| self.environments.iter().any(|e| e.eq_ignore_ascii_case(env)))
    }
}

/// A discovered script with its content and checksum.
///
/// The content read here is the content that gets executed.
#[derive(Debug, Clone)]
pub struct ChecksummedScript {
    /// Discovery information.
    pub entry: ScriptEntry,
    /// File content (UTF-8, byte-order mark removed).
    pub content: String,
    /// SHA-256 hex digest of the content with CRLF normalized to LF.
    pub checksum: String,
}

/// Compute the checksum recorded for a script.
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    if content.contains("\r\n") {
        hasher.update(content.replace("\r\n", "\n").as_bytes());
    } else {
        hasher.update(content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// The ordered, environment-filtered scripts of one directory.
#[derive(Debug, Clone)]
pub struct ScriptCatalog {
    /// Directory the catalog was built from.
    pub directory: PathBuf,
    /// Scripts in execution order.
    pub scripts: Vec<ChecksummedScript>,
}

impl ScriptCatalog {
    /// Discover, classify, filter and checksum the scripts under `directory`.
    pub async fn build(
        directory: impl Into<PathBuf>,
        kind: CatalogKind,
        environment: Option<&str>,
    ) -> MigrateResult<Self> {
        let directory = directory.into();
        let files = list_files(&directory).await?;

        let mut entries = Vec::new();
        for (id, path) in files {
            let Some(entry) = classify(&id, &path, kind)? else {
                continue;
            };
            if entry.matches_environment(environment) {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| {
            a.kind
                .group()
                .cmp(&b.kind.group())
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut scripts = Vec::with_capacity(entries.len());
        for (ordinal, mut entry) in entries.into_iter().enumerate() {
            entry.ordinal = ordinal;
            let content = read_script(&entry.path).await?;
            let checksum = checksum(&content);
            scripts.push(ChecksummedScript {
                entry,
                content,
                checksum,
            });
        }

        Ok(Self { directory, scripts })
    }

    /// Number of scripts.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether the catalog holds no scripts.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Iterate scripts in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &ChecksummedScript> {
        self.scripts.iter()
    }
}

/// Recursively list regular files as `(relative id, path)`, skipping hidden
/// entries.
async fn list_files(directory: &Path) -> MigrateResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut pending = vec![(String::new(), directory.to_path_buf())];

    while let Some((prefix, dir)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| MigrationError::script_discovery(&dir, e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MigrationError::script_discovery(&dir, e.to_string()))?
        {
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                return Err(MigrationError::script_discovery(
                    &path,
                    "file name is not valid UTF-8",
                ));
            };
            if name.starts_with('.') {
                continue;
            }

            let id = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };

            let meta = tokio::fs::metadata(&path)
                .await
                .map_err(|e| MigrationError::script_discovery(&path, e.to_string()))?;
            if meta.is_dir() {
                pending.push((id, path));
            } else if meta.is_file() {
                files.push((id, path));
            }
        }
    }

    Ok(files)
}

async fn read_script(path: &Path) -> MigrateResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| MigrationError::script_discovery(path, e.to_string()))?;
    let mut content = String::from_utf8(bytes)
        .map_err(|_| MigrationError::script_discovery(path, "file is not valid UTF-8"))?;
    if content.starts_with('\u{feff}') {
        content.remove(0);
    }
    Ok(content)
}

fn classify(id: &str, path: &Path, kind: CatalogKind) -> MigrateResult<Option<ScriptEntry>> {
    let file_name = id.rsplit('/').next().unwrap_or(id);
    let segments: Vec<&str> = file_name.split('.').collect();
    if segments.len() < 2 {
        return Ok(None);
    }

    let extension = segments[segments.len() - 1].to_ascii_lowercase();
    let base = segments[0];
    let markers = &segments[1..segments.len() - 1];

    let mut environments = Vec::new();
    let mut phase = None;
    for marker in markers {
        let lower = marker.to_ascii_lowercase();
        if let Some(env) = lower.strip_prefix("env-") {
            if !env.is_empty() {
                environments.push(env.to_string());
            }
        } else if lower == "pre" || lower == "post" {
            phase = Some(lower);
        }
    }

    let (script_kind, bulk_target) = match (extension.as_str(), kind) {
        ("sql", CatalogKind::Erase) => (ScriptKind::Erase, None),
        ("sql", CatalogKind::Pre) => (ScriptKind::PreRun, None),
        ("sql", CatalogKind::Post) => (ScriptKind::PostRun, None),
        ("sql", CatalogKind::Version) => match phase.as_deref() {
            Some("pre") => (ScriptKind::PreRun, None),
            Some("post") => (ScriptKind::PostRun, None),
            _ => (ScriptKind::Run, None),
        },
        ("csv", CatalogKind::Erase) => return Ok(None),
        ("csv", _) => {
            // pre/post are table name segments for data files
            let mut parts = vec![base];
            for marker in markers {
                if !marker.to_ascii_lowercase().starts_with("env-") {
                    parts.push(marker);
                }
            }
            (ScriptKind::BulkImport, Some(bulk_target(path, &parts)?))
        }
        _ => return Ok(None),
    };

    Ok(Some(ScriptEntry {
        id: id.to_string(),
        path: path.to_path_buf(),
        kind: script_kind,
        environments,
        ordinal: 0,
        bulk_target,
    }))
}

fn bulk_target(path: &Path, parts: &[&str]) -> MigrateResult<BulkTarget> {
    match parts {
        [table] if !table.is_empty() => Ok(BulkTarget {
            schema: None,
            table: table.to_string(),
        }),
        [schema, table] if !schema.is_empty() && !table.is_empty() => Ok(BulkTarget {
            schema: Some(schema.to_string()),
            table: table.to_string(),
        }),
        _ => Err(MigrationError::script_discovery(
            path,
            "bulk file must be named <table>.csv or <schema>.<table>.csv",
        )),
    }
}
