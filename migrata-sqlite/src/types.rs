//! Value rendering for SQLite result rows.

use rusqlite::Row;
use rusqlite::types::ValueRef;

use migrata_core::TextRow;

/// Render a SQLite value as text. Blobs are rendered as lowercase hex.
pub fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Some(hex::encode(bytes)),
    }
}

/// Render every column of a row.
pub fn row_to_text(row: &Row<'_>, columns: usize) -> rusqlite::Result<TextRow> {
    (0..columns)
        .map(|i| row.get_ref(i).map(value_to_text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(ValueRef::Null), None);
        assert_eq!(value_to_text(ValueRef::Integer(42)), Some("42".into()));
        assert_eq!(value_to_text(ValueRef::Real(1.5)), Some("1.5".into()));
        assert_eq!(value_to_text(ValueRef::Text(b"v0.01")), Some("v0.01".into()));
        assert_eq!(value_to_text(ValueRef::Blob(&[0xde, 0xad])), Some("dead".into()));
    }

    #[test]
    fn test_row_to_text() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let row = conn
            .query_row("SELECT 1, NULL, 'x'", [], |row| row_to_text(row, 3))
            .unwrap();
        assert_eq!(row, vec![Some("1".into()), None, Some("x".into())]);
    }
}
