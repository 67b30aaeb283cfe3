//! Rendering of MySQL values as text.

use mysql_async::{Row, Value};

use migrata_core::TextRow;

/// Render a MySQL value the way the text protocol would.
///
/// Binary payloads that are not UTF-8 come back as lowercase hex.
pub fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => hex::encode(e.into_bytes()),
        }),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Date(year, month, day, hour, minute, second, micro) => Some(if micro == 0 {
            format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
        } else {
            format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micro:06}")
        }),
        Value::Time(is_neg, days, hours, minutes, seconds, micro) => {
            let sign = if is_neg { "-" } else { "" };
            let hours = days * 24 + u32::from(hours);
            Some(if micro == 0 {
                format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
            } else {
                format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micro:06}")
            })
        }
    }
}

/// Convert a row into text columns.
pub fn row_to_text(mut row: Row) -> TextRow {
    (0..row.len())
        .map(|i| row.take::<Value, _>(i).and_then(value_to_text))
        .collect()
}
