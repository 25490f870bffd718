use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
///
/// Types SQLite has no storage class for are bound as their text rendering,
/// which the decoders read back when the column is declared with that type.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Null => Value::Null,
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
        other => other.to_text().map_or(Value::Null, Value::Text),
    }
}

/// Convert a full argument list, preserving positions.
#[must_use]
pub fn convert(args: &[RowValues]) -> Vec<Value> {
    args.iter().map(row_value_to_sqlite_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn native_and_rendered_values() {
        assert_eq!(row_value_to_sqlite_value(&RowValues::Bool(true)), Value::Integer(1));
        assert_eq!(row_value_to_sqlite_value(&RowValues::Null), Value::Null);
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date");
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Date(date)),
            Value::Text("2024-02-29".to_string())
        );
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::JSON(serde_json::json!({"a": 1}))),
            Value::Text(r#"{"a":1}"#.to_string())
        );
    }
}
