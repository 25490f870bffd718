use chrono::NaiveDate;
use serde_json::json;
use sql_adapter::RowValues;
use sql_adapter::decode::{TypeDecoderTable, oid};

#[test]
fn null_wire_values_decode_to_null_for_every_registered_code() {
    let table = TypeDecoderTable::standard();
    let codes = [
        oid::BOOL,
        oid::BYTEA,
        oid::INT8,
        oid::INT2,
        oid::INT4,
        oid::OID,
        oid::JSON,
        oid::FLOAT4,
        oid::FLOAT8,
        oid::MONEY,
        oid::DATE,
        oid::TIME,
        oid::TIMESTAMP,
        oid::TIMESTAMPTZ,
        oid::NUMERIC,
        oid::JSONB,
    ];
    for code in codes {
        assert!(table.has_decoder(code), "code {code} should be registered");
        assert_eq!(table.decode(code, None), RowValues::Null, "code {code}");
    }
}

#[test]
fn boolean_decoding_follows_the_wire_literals() {
    let table = TypeDecoderTable::standard();
    for truthy in ["t", "T", "true", "TRUE"] {
        assert_eq!(table.decode(oid::BOOL, Some(truthy)), RowValues::Bool(true));
    }
    assert_eq!(table.decode(oid::BOOL, Some("")), RowValues::Null);
    for other in ["f", "no", "1", "x"] {
        assert_eq!(table.decode(oid::BOOL, Some(other)), RowValues::Bool(false));
    }
}

#[test]
fn numeric_decoding_is_idempotent_through_text() {
    let table = TypeDecoderTable::standard();
    let cases = [
        (oid::INT2, "12"),
        (oid::INT8, "-9223372036854775808"),
        (oid::FLOAT8, "0.1"),
        (oid::FLOAT4, "-2.5"),
        (oid::NUMERIC, "1.000"),
        (oid::NUMERIC, "-0.000001"),
        (oid::MONEY, "$1,000.25"),
    ];
    for (code, raw) in cases {
        let once = table.decode(code, Some(raw));
        let text = once.to_text().expect("decoded value has text");
        assert_eq!(table.decode(code, Some(&text)), once, "{raw}");
    }
}

#[test]
fn structured_types() {
    let table = TypeDecoderTable::standard();
    assert_eq!(
        table.decode(oid::DATE, Some("2024-02-29")),
        RowValues::Date(NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date"))
    );
    assert_eq!(
        table.decode(oid::JSONB, Some(r#"{"a":[1,2]}"#)),
        RowValues::JSON(json!({"a": [1, 2]}))
    );
    assert_eq!(
        table.decode(oid::BYTEA, Some("\\x00ff")),
        RowValues::Blob(vec![0x00, 0xff])
    );
    assert_eq!(
        table.decode(oid::VARCHAR, Some("plain")),
        RowValues::Text("plain".to_string())
    );
}

#[test]
fn custom_decoders_override_the_standard_table() {
    fn shout(raw: &str) -> RowValues {
        RowValues::Text(raw.to_uppercase())
    }

    let mut table = TypeDecoderTable::standard();
    table.register(oid::VARCHAR, shout);
    assert_eq!(
        table.decode(oid::VARCHAR, Some("hi")),
        RowValues::Text("HI".to_string())
    );
    assert!(!TypeDecoderTable::new().has_decoder(oid::BOOL));
}
