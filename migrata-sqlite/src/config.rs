//! SQLite configuration.

use std::path::{Path, PathBuf};

use crate::error::{SqliteError, SqliteResult};

/// SQLite database configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path (or ":memory:" for in-memory).
    pub path: DatabasePath,
    /// Enable foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Synchronous mode; the SQLite default when `None`.
    pub synchronous: Option<SynchronousMode>,
    /// Journal mode; the SQLite default when `None`.
    pub journal_mode: Option<JournalMode>,
}

/// Database path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    /// Display name, used as the database name in messages.
    pub fn display_name(&self) -> String {
        match self {
            Self::Memory => ":memory:".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// SQLite synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronousMode {
    /// Synchronous OFF.
    Off,
    /// Synchronous NORMAL.
    Normal,
    /// Synchronous FULL.
    Full,
    /// Synchronous EXTRA.
    Extra,
}

impl SynchronousMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }

    fn parse(value: &str) -> SqliteResult<Self> {
        match value.to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "normal" => Ok(Self::Normal),
            "full" => Ok(Self::Full),
            "extra" => Ok(Self::Extra),
            other => Err(SqliteError::config(format!("unknown synchronous mode '{other}'"))),
        }
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// DELETE - deletes the journal after each transaction.
    Delete,
    /// TRUNCATE - truncates the journal instead of deleting it.
    Truncate,
    /// PERSIST - keeps the journal file and zeroes its header.
    Persist,
    /// MEMORY - keeps the journal in memory.
    Memory,
    /// WAL - write-ahead logging.
    Wal,
    /// OFF - no journal.
    Off,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }

    fn parse(value: &str) -> SqliteResult<Self> {
        match value.to_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "truncate" => Ok(Self::Truncate),
            "persist" => Ok(Self::Persist),
            "memory" => Ok(Self::Memory),
            "wal" => Ok(Self::Wal),
            "off" => Ok(Self::Off),
            other => Err(SqliteError::config(format!("unknown journal mode '{other}'"))),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            synchronous: None,
            journal_mode: None,
        }
    }
}

impl SqliteConfig {
    /// Create a new configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a new configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a SQLite connection string.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` - In-memory database
    /// - `sqlite://path/to/db.sqlite` - Relative path
    /// - `sqlite:///absolute/path/db.sqlite` - Absolute path
    /// - `file:path/to/db.sqlite` - Alternative format
    /// - `Data Source=path/to/db.sqlite` - ADO.NET style
    /// - `path/to/db.sqlite` - Plain path
    ///
    /// Query parameters: `foreign_keys`, `busy_timeout`, `synchronous`,
    /// `journal_mode`.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url_str = url.as_ref().trim();
        if url_str.is_empty() {
            return Err(SqliteError::config("database path is required"));
        }

        if url_str == "sqlite::memory:" || url_str == ":memory:" {
            return Ok(Self::memory());
        }

        if let Some(path) = ado_data_source(url_str) {
            return Ok(Self::file(path));
        }

        let (location, query) = match url_str.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url_str, None),
        };

        let path = if let Some(path) = location.strip_prefix("sqlite://") {
            path
        } else if let Some(path) = location.strip_prefix("sqlite:") {
            path
        } else if let Some(path) = location.strip_prefix("file:") {
            path
        } else {
            location
        };

        let mut config = match path {
            "" => return Err(SqliteError::config("database path is required")),
            ":memory:" => Self::memory(),
            path => Self::file(path),
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "mode" if value == "memory" => config.path = DatabasePath::Memory,
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "busy_timeout" => {
                    let ms = value.parse().map_err(|_| {
                        SqliteError::config(format!("invalid busy_timeout '{value}'"))
                    })?;
                    config.busy_timeout_ms = Some(ms);
                }
                "synchronous" => config.synchronous = Some(SynchronousMode::parse(value)?),
                "journal_mode" => config.journal_mode = Some(JournalMode::parse(value)?),
                _ => {}
            }
        }

        Ok(config)
    }

    /// Pragmas run on every new connection.
    pub fn init_sql(&self) -> String {
        let mut sql = String::new();

        if self.foreign_keys {
            sql.push_str("PRAGMA foreign_keys = ON;\n");
        }
        if let Some(ms) = self.busy_timeout_ms {
            sql.push_str(&format!("PRAGMA busy_timeout = {ms};\n"));
        }
        if let Some(mode) = self.synchronous {
            sql.push_str(&format!("PRAGMA synchronous = {};\n", mode.as_pragma()));
        }
        if let Some(mode) = self.journal_mode {
            sql.push_str(&format!("PRAGMA journal_mode = {};\n", mode.as_pragma()));
        }

        sql
    }
}

fn ado_data_source(conn_str: &str) -> Option<&str> {
    conn_str.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        let key = key.trim();
        (key.eq_ignore_ascii_case("data source") || key.eq_ignore_ascii_case("datasource"))
            .then(|| value.trim())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_urls() {
        for url in ["sqlite::memory:", ":memory:", "sqlite://:memory:", "file:x.db?mode=memory"] {
            assert!(SqliteConfig::from_url(url).unwrap().path.is_memory(), "{url}");
        }
    }

    #[test]
    fn test_file_urls() {
        let config = SqliteConfig::from_url("sqlite://./data/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("./data/app.db")));

        let config = SqliteConfig::from_url("sqlite:///var/lib/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("/var/lib/app.db")));

        let config = SqliteConfig::from_url("app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("app.db")));

        let config = SqliteConfig::from_url("Data Source=/tmp/app.db;Version=3").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("/tmp/app.db")));
    }

    #[test]
    fn test_query_parameters() {
        let config = SqliteConfig::from_url(
            "sqlite://app.db?foreign_keys=false&busy_timeout=100&journal_mode=wal&synchronous=full",
        )
        .unwrap();
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, Some(100));
        assert_eq!(config.journal_mode, Some(JournalMode::Wal));
        assert_eq!(config.synchronous, Some(SynchronousMode::Full));

        let sql = config.init_sql();
        assert!(!sql.contains("foreign_keys"));
        assert!(sql.contains("PRAGMA journal_mode = WAL;"));
        assert!(sql.contains("PRAGMA busy_timeout = 100;"));
    }

    #[test]
    fn test_invalid_urls() {
        assert!(SqliteConfig::from_url("").is_err());
        assert!(SqliteConfig::from_url("sqlite://").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?journal_mode=fast").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?busy_timeout=soon").is_err());
    }

    #[test]
    fn test_default_init_sql() {
        let sql = SqliteConfig::memory().init_sql();
        assert_eq!(sql, "PRAGMA foreign_keys = ON;\nPRAGMA busy_timeout = 5000;\n");
    }
}
