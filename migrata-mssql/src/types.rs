//! Rendering of SQL Server values as text.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{ColumnData, FromSql, Row};

use migrata_core::TextRow;

use crate::error::MssqlResult;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Render one column value as text, `None` for SQL `NULL`.
pub fn column_to_text(data: &ColumnData<'static>) -> MssqlResult<Option<String>> {
    Ok(match data {
        ColumnData::U8(v) => v.map(|v| v.to_string()),
        ColumnData::I16(v) => v.map(|v| v.to_string()),
        ColumnData::I32(v) => v.map(|v| v.to_string()),
        ColumnData::I64(v) => v.map(|v| v.to_string()),
        ColumnData::F32(v) => v.map(|v| v.to_string()),
        ColumnData::F64(v) => v.map(|v| v.to_string()),
        ColumnData::Bit(v) => v.map(|v| if v { "1" } else { "0" }.to_string()),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()),
        ColumnData::Guid(v) => v.map(|g| g.to_string()),
        ColumnData::Binary(v) => v.as_ref().map(|b| hex::encode(b.as_ref())),
        ColumnData::Numeric(v) => v.map(|n| n.to_string()),
        ColumnData::Xml(v) => v.as_ref().map(|x| x.to_string()),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map(|ts| ts.format(DATETIME_FORMAT).to_string())
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.map(|d| d.to_string()),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.map(|t| t.to_string()),
        ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(data)?.map(|ts| ts.to_rfc3339())
        }
    })
}

/// Convert a row into text columns.
pub fn row_to_text(row: Row) -> MssqlResult<TextRow> {
    row.into_iter().map(|data| column_to_text(&data)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_scalar_columns() {
        assert_eq!(column_to_text(&ColumnData::I32(None)).unwrap(), None);
        assert_eq!(
            column_to_text(&ColumnData::I64(Some(1250))).unwrap().as_deref(),
            Some("1250")
        );
        assert_eq!(
            column_to_text(&ColumnData::Bit(Some(true))).unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(
            column_to_text(&ColumnData::String(Some(Cow::Borrowed("v001"))))
                .unwrap()
                .as_deref(),
            Some("v001")
        );
        assert_eq!(
            column_to_text(&ColumnData::Binary(Some(Cow::Owned(vec![0xca, 0xfe]))))
                .unwrap()
                .as_deref(),
            Some("cafe")
        );
    }
}
