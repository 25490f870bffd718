//! Type-code dispatch from backend text to [`RowValues`].
//!
//! A [`TypeDecoderTable`] maps a backend type code to a decoding function. Codes
//! without an entry are returned as text unchanged. Decoders never fail: text a
//! decoder cannot parse comes back as [`RowValues::Text`] and is logged at debug
//! level.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use bigdecimal::BigDecimal;

use crate::types::RowValues;

/// Backend type codes (PostgreSQL OIDs) understood by the standard table.
pub mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const JSON: u32 = 114;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const MONEY: u32 = 790;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIME: u32 = 1083;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const NUMERIC: u32 = 1700;
    pub const JSONB: u32 = 3802;
}

/// Decoding function for one type code. Receives non-null wire text only.
pub type Decoder = fn(&str) -> RowValues;

#[derive(Debug, Clone, Default)]
pub struct TypeDecoderTable {
    decoders: HashMap<u32, Decoder>,
}

impl TypeDecoderTable {
    /// An empty table: every value decodes as text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table for the built-in type codes in [`oid`].
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(oid::BOOL, decode_bool);
        for code in [oid::INT2, oid::INT4, oid::INT8, oid::OID] {
            table.register(code, decode_int);
        }
        table.register(oid::FLOAT4, decode_float);
        table.register(oid::FLOAT8, decode_float);
        table.register(oid::NUMERIC, decode_numeric);
        table.register(oid::MONEY, decode_money);
        table.register(oid::DATE, decode_date);
        table.register(oid::TIME, decode_time);
        table.register(oid::TIMESTAMP, decode_timestamp);
        table.register(oid::TIMESTAMPTZ, decode_timestamptz);
        table.register(oid::BYTEA, decode_bytea);
        table.register(oid::JSON, decode_json);
        table.register(oid::JSONB, decode_json);
        table
    }

    /// Add or replace the decoder for `code`.
    pub fn register(&mut self, code: u32, decoder: Decoder) -> &mut Self {
        self.decoders.insert(code, decoder);
        self
    }

    #[must_use]
    pub fn has_decoder(&self, code: u32) -> bool {
        self.decoders.contains_key(&code)
    }

    /// Decode one wire value. `None` is SQL NULL and never reaches a decoder.
    #[must_use]
    pub fn decode(&self, code: u32, raw: Option<&str>) -> RowValues {
        let Some(raw) = raw else {
            return RowValues::Null;
        };
        match self.decoders.get(&code) {
            Some(decoder) => decoder(raw),
            None => RowValues::Text(raw.to_string()),
        }
    }
}

fn fallback(raw: &str, kind: &str) -> RowValues {
    tracing::debug!(value = raw, kind, "value did not parse for its type, keeping text");
    RowValues::Text(raw.to_string())
}

/// `t`/`true` (any case) is true, blank is NULL, anything else is false.
#[must_use]
pub fn decode_bool(raw: &str) -> RowValues {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        RowValues::Null
    } else {
        RowValues::Bool(trimmed.eq_ignore_ascii_case("t") || trimmed.eq_ignore_ascii_case("true"))
    }
}

#[must_use]
pub fn decode_int(raw: &str) -> RowValues {
    raw.trim()
        .parse::<i64>()
        .map_or_else(|_| fallback(raw, "integer"), RowValues::Int)
}

#[must_use]
pub fn decode_float(raw: &str) -> RowValues {
    raw.trim()
        .parse::<f64>()
        .map_or_else(|_| fallback(raw, "float"), RowValues::Float)
}

/// Arbitrary precision: every digit the server sent survives. `NaN` and the
/// infinities have no decimal form and stay text.
#[must_use]
pub fn decode_numeric(raw: &str) -> RowValues {
    BigDecimal::from_str(raw.trim())
        .map_or_else(|_| fallback(raw, "numeric"), RowValues::Decimal)
}

/// Money text carries a currency symbol and group separators (`-$1,234.50`,
/// `($3.00)`); both are stripped before the decimal parse. Locales that swap
/// the separators (`1.234,50`) are left as text rather than misread.
#[must_use]
pub fn decode_money(raw: &str) -> RowValues {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        },
    };
    if let Some(dot) = body.rfind('.')
        && (body[..dot].contains('.') || body[dot..].contains(','))
    {
        return fallback(raw, "money");
    }
    let digits: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    match BigDecimal::from_str(&digits) {
        Ok(value) if negative => RowValues::Decimal(-value),
        Ok(value) => RowValues::Decimal(value),
        Err(_) => fallback(raw, "money"),
    }
}

#[must_use]
pub fn decode_date(raw: &str) -> RowValues {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_or_else(|_| fallback(raw, "date"), RowValues::Date)
}

#[must_use]
pub fn decode_time(raw: &str) -> RowValues {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S%.f")
        .map_or_else(|_| fallback(raw, "time"), RowValues::Time)
}

#[must_use]
pub fn decode_timestamp(raw: &str) -> RowValues {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_or_else(|_| fallback(raw, "timestamp"), RowValues::Timestamp)
}

/// Server offsets may omit minutes (`+00`), which `%#z` accepts.
#[must_use]
pub fn decode_timestamptz(raw: &str) -> RowValues {
    let trimmed = raw.trim();
    DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .map_or_else(|_| fallback(raw, "timestamptz"), RowValues::TimestampTz)
}

#[must_use]
pub fn decode_json(raw: &str) -> RowValues {
    serde_json::from_str(raw).map_or_else(|_| fallback(raw, "json"), RowValues::JSON)
}

#[must_use]
pub fn decode_bytea(raw: &str) -> RowValues {
    unescape_bytea(raw).map_or_else(|| fallback(raw, "bytea"), RowValues::Blob)
}

/// Reverse the bytea text encodings: hex (`\x0aff`) and the legacy escape form
/// where `\\` is a backslash and `\nnn` an octal byte.
#[must_use]
pub fn unescape_bytea(raw: &str) -> Option<Vec<u8>> {
    if let Some(hex_digits) = raw.strip_prefix("\\x") {
        return hex::decode(hex_digits).ok();
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b != b'\\' {
            out.push(b);
            idx += 1;
            continue;
        }
        if bytes.get(idx + 1) == Some(&b'\\') {
            out.push(b'\\');
            idx += 2;
            continue;
        }
        let octal = bytes.get(idx + 1..idx + 4)?;
        if !octal.iter().all(|d| (b'0'..=b'7').contains(d)) {
            return None;
        }
        let value = octal
            .iter()
            .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
        out.push(u8::try_from(value).ok()?);
        idx += 4;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_short_circuits_every_registered_code() {
        let table = TypeDecoderTable::standard();
        for code in [oid::BOOL, oid::INT4, oid::NUMERIC, oid::BYTEA, oid::JSONB, oid::TEXT, 99_999] {
            assert_eq!(table.decode(code, None), RowValues::Null, "code {code}");
        }
    }

    #[test]
    fn boolean_literals() {
        for t in ["t", "T", "true", "TRUE", "True"] {
            assert_eq!(decode_bool(t), RowValues::Bool(true), "{t}");
        }
        for blank in ["", "   "] {
            assert_eq!(decode_bool(blank), RowValues::Null);
        }
        for f in ["f", "false", "0", "yes"] {
            assert_eq!(decode_bool(f), RowValues::Bool(false), "{f}");
        }
    }

    #[test]
    fn unmapped_code_returns_raw_text() {
        let table = TypeDecoderTable::standard();
        assert_eq!(
            table.decode(600, Some("(1,2)")),
            RowValues::Text("(1,2)".to_string())
        );
    }

    #[test]
    fn numeric_keeps_precision() {
        let value = decode_numeric("12345678901234567890.123456789");
        assert_eq!(
            value.to_text().as_deref(),
            Some("12345678901234567890.123456789")
        );
    }

    #[test]
    fn numeric_beyond_28_digits_is_exact() {
        for raw in [
            "0.123456789012345678901234567890123",
            "123456789012345678901234567890.5",
            "-98765432109876543210987654321098765432.000000000000000000000000000001",
        ] {
            let value = decode_numeric(raw);
            assert!(matches!(value, RowValues::Decimal(_)), "{raw}: {value:?}");
            assert_eq!(value.to_text().as_deref(), Some(raw));
        }
        assert_eq!(decode_numeric("NaN"), RowValues::Text("NaN".to_string()));
    }

    #[test]
    fn money_strips_currency() {
        assert_eq!(
            decode_money("-$1,234.50"),
            RowValues::Decimal(BigDecimal::from_str("-1234.50").expect("decimal"))
        );
        assert_eq!(
            decode_money("($3.00)"),
            RowValues::Decimal(BigDecimal::from_str("-3.00").expect("decimal"))
        );
    }

    #[test]
    fn money_with_swapped_separators_stays_text() {
        for raw in ["1.234,50", "€1.234.567", "1.2.3"] {
            assert_eq!(decode_money(raw), RowValues::Text(raw.to_string()), "{raw}");
        }
        assert_eq!(
            decode_money("$1,234,567.89"),
            RowValues::Decimal(BigDecimal::from_str("1234567.89").expect("decimal"))
        );
    }

    #[test]
    fn numeric_decoders_are_idempotent() {
        let cases: [(Decoder, &str); 5] = [
            (decode_int, "-9001"),
            (decode_float, "3.25"),
            (decode_float, "1e300"),
            (decode_numeric, "0.10"),
            (decode_money, "$99.99"),
        ];
        for (decoder, raw) in cases {
            let once = decoder(raw);
            let text = once.to_text().expect("not null");
            assert_eq!(decoder(&text), once, "{raw}");
        }
    }

    #[test]
    fn bytea_hex_and_escape_forms() {
        assert_eq!(unescape_bytea("\\xdeadbeef"), Some(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(unescape_bytea("a\\\\b\\001"), Some(vec![b'a', b'\\', b'b', 1]));
        assert_eq!(decode_bytea("\\x0"), RowValues::Text("\\x0".to_string()));
    }

    #[test]
    fn timestamps_with_short_offsets() {
        let value = decode_timestamptz("2024-05-01 10:30:00.25+00");
        assert!(matches!(value, RowValues::TimestampTz(_)), "{value:?}");
        let value = decode_timestamp("2024-05-01 10:30:00");
        assert!(matches!(value, RowValues::Timestamp(_)));
    }

    #[test]
    fn garbage_falls_back_to_text() {
        assert_eq!(decode_int("abc"), RowValues::Text("abc".to_string()));
        assert_eq!(decode_date("soon"), RowValues::Text("soon".to_string()));
    }
}
