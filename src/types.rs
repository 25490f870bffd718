use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;

/// Canonical values produced by the type decoders and accepted as bind arguments.
///
/// Every backend decodes into the same enum so callers never branch on driver
/// types:
/// ```rust
/// use sql_adapter::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Arbitrary-precision value (`numeric`, `money`) without rounding loss
    Decimal(BigDecimal),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Timestamp without zone
    Timestamp(NaiveDateTime),
    /// Timestamp with the offset the server reported
    TimestampTz(DateTime<FixedOffset>),
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// Text/string value, also the fallback for unmapped type codes
    Text(String),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            RowValues::Decimal(value) => Some(value.clone()),
            RowValues::Int(value) => Some(BigDecimal::from(*value)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::TimestampTz(value) => Some(value.naive_utc()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Render the value the way the backend writes it in its text protocol.
    ///
    /// `Null` has no text form. Blobs use the bytea hex form (`\x0a0b`), which
    /// [`decode_bytea`](crate::decode::decode_bytea) reverses.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            RowValues::Null => return None,
            RowValues::Bool(b) => if *b { "t" } else { "f" }.to_string(),
            RowValues::Int(i) => i.to_string(),
            RowValues::Float(f) => f.to_string(),
            RowValues::Decimal(d) => d.to_plain_string(),
            RowValues::Date(d) => d.format("%Y-%m-%d").to_string(),
            RowValues::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            RowValues::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            RowValues::TimestampTz(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
            RowValues::JSON(json) => json.to_string(),
            RowValues::Blob(bytes) => format!("\\x{}", hex::encode(bytes)),
            RowValues::Text(s) => s.clone(),
        };
        Some(text)
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for RowValues {
                fn from(value: $ty) -> Self {
                    RowValues::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    BigDecimal => Decimal,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<FixedOffset> => TimestampTz,
    JsonValue => JSON,
    Vec<u8> => Blob,
    String => Text,
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Named bind values for prepared and bound calls, keyed without the `__type` suffix.
pub type Params = BTreeMap<String, RowValues>;

/// Build a [`Params`] map.
///
/// ```rust
/// use sql_adapter::params;
///
/// let p = params! { "id" => 5, "name" => "alice" };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::types::Params::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::types::Params::new();
        $( map.insert(::std::string::String::from($key), $crate::types::RowValues::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_has_no_text() {
        assert_eq!(RowValues::Null.to_text(), None);
        assert_eq!(RowValues::from(None::<i64>), RowValues::Null);
    }

    #[test]
    fn renders_backend_text() {
        assert_eq!(RowValues::Bool(true).to_text().as_deref(), Some("t"));
        assert_eq!(RowValues::Int(-42).to_text().as_deref(), Some("-42"));
        assert_eq!(
            RowValues::Blob(vec![0xde, 0xad]).to_text().as_deref(),
            Some("\\xdead")
        );
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date");
        assert_eq!(RowValues::Date(date).to_text().as_deref(), Some("2024-02-29"));
    }

    #[test]
    fn params_macro_converts_scalars() {
        let p = crate::params! { "id" => 5, "name" => "bob", "gone" => None::<i64> };
        assert_eq!(p.get("id"), Some(&RowValues::Int(5)));
        assert_eq!(p.get("name"), Some(&RowValues::Text("bob".into())));
        assert_eq!(p.get("gone"), Some(&RowValues::Null));
    }
}
