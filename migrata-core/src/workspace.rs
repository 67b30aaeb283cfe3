//! Workspace discovery and scaffolding.
//!
//! A workspace is a directory holding version directories (`v0.00`, `v0.01`,
//! ...) and the reserved global directories `_init`, `_pre`, `_post` and
//! `_erase`. Everything else at the root is ignored.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::version::Version;

/// Reserved directories that hold scripts outside the versioned history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalDirectory {
    /// Runs once, before the first version is ever applied.
    Init,
    /// Runs before pending versions.
    Pre,
    /// Runs after pending versions.
    Post,
    /// Teardown scripts for the erase flow.
    Erase,
}

impl GlobalDirectory {
    /// All global directories, in execution order.
    pub const ALL: [GlobalDirectory; 4] = [Self::Init, Self::Pre, Self::Post, Self::Erase];

    /// Directory name on disk.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Init => "_init",
            Self::Pre => "_pre",
            Self::Post => "_post",
            Self::Erase => "_erase",
        }
    }

    fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.dir_name() == name)
    }
}

/// A version directory found in the workspace.
#[derive(Debug, Clone)]
pub struct VersionDirectory {
    /// Parsed version.
    pub version: Version,
    /// Absolute or root-relative path.
    pub path: PathBuf,
}

/// Which component `vnext` increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionBump {
    /// `v0.01` -> `v0.02`
    #[default]
    Minor,
    /// `v0.01` -> `v1.00`
    Major,
}

/// The discovered structure of a workspace.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLayout {
    /// Version directories in ascending order.
    pub versions: Vec<VersionDirectory>,
    /// `_init` directory, if present.
    pub init: Option<PathBuf>,
    /// `_pre` directory, if present.
    pub pre: Option<PathBuf>,
    /// `_post` directory, if present.
    pub post: Option<PathBuf>,
    /// `_erase` directory, if present.
    pub erase: Option<PathBuf>,
}

impl WorkspaceLayout {
    /// Path of a global directory, if present.
    pub fn global(&self, dir: GlobalDirectory) -> Option<&Path> {
        match dir {
            GlobalDirectory::Init => self.init.as_deref(),
            GlobalDirectory::Pre => self.pre.as_deref(),
            GlobalDirectory::Post => self.post.as_deref(),
            GlobalDirectory::Erase => self.erase.as_deref(),
        }
    }

    /// Versions not yet applied, at or below the ceiling, in ascending order.
    pub fn pending(
        &self,
        applied: &BTreeSet<Version>,
        ceiling: Option<&Version>,
    ) -> Vec<VersionDirectory> {
        self.versions
            .iter()
            .filter(|v| !applied.contains(&v.version))
            .filter(|v| ceiling.is_none_or(|max| v.version <= *max))
            .cloned()
            .collect()
    }

    /// The highest version in the workspace.
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last().map(|v| &v.version)
    }
}

/// A migration workspace rooted at a directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a handle for the workspace at `root`. Nothing is read yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover version and global directories.
    ///
    /// Fails when the root does not exist, when it holds neither a version
    /// directory nor `_erase`, when a version-like directory name is malformed,
    /// or when two directories share a version rank.
    pub async fn discover(&self) -> MigrateResult<WorkspaceLayout> {
        let layout = self.scan().await?;
        if layout.versions.is_empty() && layout.erase.is_none() {
            return Err(MigrationError::invalid_workspace(format!(
                "'{}' contains no version directories",
                self.root.display()
            )));
        }
        Ok(layout)
    }

    async fn scan(&self) -> MigrateResult<WorkspaceLayout> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(MigrationError::invalid_workspace(format!(
                "'{}' does not exist",
                self.root.display()
            )));
        }

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            MigrationError::invalid_workspace(format!("'{}': {e}", self.root.display()))
        })?;

        let mut layout = WorkspaceLayout::default();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => {}
                _ => continue,
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };

            if let Some(global) = GlobalDirectory::from_dir_name(&name) {
                match global {
                    GlobalDirectory::Init => layout.init = Some(path),
                    GlobalDirectory::Pre => layout.pre = Some(path),
                    GlobalDirectory::Post => layout.post = Some(path),
                    GlobalDirectory::Erase => layout.erase = Some(path),
                }
            } else if Version::is_version_like(&name) {
                let version = Version::parse(&name)?;
                layout.versions.push(VersionDirectory { version, path });
            } else {
                debug!(directory = %name, "Ignoring non-version directory");
            }
        }

        layout.versions.sort_by(|a, b| a.version.cmp(&b.version));
        for pair in layout.versions.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(MigrationError::invalid_workspace(format!(
                    "'{}' and '{}' resolve to the same version",
                    pair[0].version, pair[1].version
                )));
            }
        }

        Ok(layout)
    }

    /// Create the standard workspace skeleton under `root`.
    ///
    /// Existing directories and files are left as they are.
    pub async fn scaffold(root: impl Into<PathBuf>) -> MigrateResult<Self> {
        let workspace = Self::new(root);
        tokio::fs::create_dir_all(&workspace.root).await?;

        for dir in [
            GlobalDirectory::Init.dir_name(),
            GlobalDirectory::Pre.dir_name(),
            "v0.00",
            GlobalDirectory::Post.dir_name(),
            GlobalDirectory::Erase.dir_name(),
        ] {
            tokio::fs::create_dir_all(workspace.root.join(dir)).await?;
        }

        let readme = workspace.root.join("README.md");
        if !tokio::fs::try_exists(&readme).await? {
            tokio::fs::write(&readme, README_TEMPLATE).await?;
        }

        Ok(workspace)
    }

    /// Create the directory for the version after the latest one, and
    /// optionally an empty script file inside it.
    ///
    /// Returns the new directory's version and path.
    pub async fn create_next_version(
        &self,
        bump: VersionBump,
        file: Option<&str>,
    ) -> MigrateResult<VersionDirectory> {
        let layout = self.scan().await?;
        let next = match layout.latest() {
            Some(latest) => match bump {
                VersionBump::Minor => latest.next_minor(),
                VersionBump::Major => latest.next_major(),
            },
            None => Version::initial(),
        };

        let path = self.root.join(next.as_str());
        tokio::fs::create_dir_all(&path).await?;

        if let Some(file) = file {
            let name = if Path::new(file).extension().is_some() {
                file.to_string()
            } else {
                format!("{file}.sql")
            };
            let script = path.join(name);
            if !tokio::fs::try_exists(&script).await? {
                tokio::fs::write(&script, "").await?;
            }
        }

        Ok(VersionDirectory {
            version: next,
            path,
        })
    }
}

const README_TEMPLATE: &str = "# Database migrations

Scripts in this workspace are applied by `migrata run`.

- `_init`: runs once, before the first version is applied.
- `_pre`: runs before pending versions on every run that applies something.
- `v0.00`, `v0.01`, ...: versioned scripts, applied in version order.
- `_post`: runs after pending versions.
- `_erase`: teardown scripts for `migrata erase`.

Name scripts `*.sql`. Use `*.pre.sql` / `*.post.sql` to run a script before or
after the rest of its version, `*.env-<code>.sql` to limit it to an
environment, and `schema.table.csv` to bulk-load data into a table.
";

#[cfg(test)]
mod tests {
    use super::*;

    async fn mkdirs(root: &Path, dirs: &[&str]) {
        for dir in dirs {
            tokio::fs::create_dir_all(root.join(dir)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_discover_orders_versions_numerically() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(
            dir.path(),
            &["v0.10", "v0.02", "v1.00", "V2.00", "_pre", "_erase", "docs"],
        )
        .await;
        tokio::fs::write(dir.path().join("v9.99"), "not a directory")
            .await
            .unwrap();

        let layout = Workspace::new(dir.path()).discover().await.unwrap();
        let names: Vec<&str> = layout.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(names, vec!["v0.02", "v0.10", "v1.00"]);
        assert!(layout.pre.is_some());
        assert!(layout.erase.is_some());
        assert!(layout.init.is_none());
        assert_eq!(layout.latest().unwrap().as_str(), "v1.00");
    }

    #[tokio::test]
    async fn test_malformed_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(dir.path(), &["v0.01", "v1.x"]).await;

        let err = Workspace::new(dir.path()).discover().await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidVersion(name) if name == "v1.x"));
    }

    #[tokio::test]
    async fn test_duplicate_rank_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(dir.path(), &["v0.1", "v0.01"]).await;

        let err = Workspace::new(dir.path()).discover().await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidWorkspace(_)));
    }

    #[tokio::test]
    async fn test_missing_or_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workspace::new(dir.path().join("nope"))
            .discover()
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidWorkspace(_)));

        mkdirs(dir.path(), &["docs", "_pre"]).await;
        let err = Workspace::new(dir.path()).discover().await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidWorkspace(_)));

        mkdirs(dir.path(), &["_erase"]).await;
        let layout = Workspace::new(dir.path()).discover().await.unwrap();
        assert!(layout.versions.is_empty());
    }

    #[tokio::test]
    async fn test_pending_respects_applied_and_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(dir.path(), &["v0.00", "v0.01", "v0.02", "v0.03"]).await;
        let layout = Workspace::new(dir.path()).discover().await.unwrap();

        let applied: BTreeSet<Version> = [Version::parse("v0.00").unwrap()].into();
        let ceiling = Version::parse("v0.02").unwrap();
        let pending = layout.pending(&applied, Some(&ceiling));
        let names: Vec<&str> = pending.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(names, vec!["v0.01", "v0.02"]);

        assert_eq!(layout.pending(&applied, None).len(), 3);
    }

    #[tokio::test]
    async fn test_scaffold_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");

        Workspace::scaffold(&root).await.unwrap();
        tokio::fs::write(root.join("README.md"), "custom").await.unwrap();
        let workspace = Workspace::scaffold(&root).await.unwrap();

        let layout = workspace.discover().await.unwrap();
        assert_eq!(layout.versions.len(), 1);
        for dir in GlobalDirectory::ALL {
            assert!(layout.global(dir).is_some(), "{} missing", dir.dir_name());
        }
        let readme = tokio::fs::read_to_string(root.join("README.md")).await.unwrap();
        assert_eq!(readme, "custom");
    }

    #[tokio::test]
    async fn test_create_next_version() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::scaffold(dir.path()).await.unwrap();

        let minor = workspace
            .create_next_version(VersionBump::Minor, Some("create_tables"))
            .await
            .unwrap();
        assert_eq!(minor.version.as_str(), "v0.01");
        assert!(minor.path.join("create_tables.sql").exists());

        let major = workspace
            .create_next_version(VersionBump::Major, None)
            .await
            .unwrap();
        assert_eq!(major.version.as_str(), "v1.00");
    }
}
