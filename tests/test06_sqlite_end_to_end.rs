#![cfg(feature = "sqlite")]

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use bigdecimal::BigDecimal;
use serde_json::json;
use sql_adapter::params;
use sql_adapter::prelude::*;

fn users_db(dir: &tempfile::TempDir) -> Result<Database, SqlAdapterError> {
    let path = dir.path().join("users.db").to_string_lossy().into_owned();
    let db = Database::sqlite_builder(path)
        .pool(PoolOptions::default().with_max_size(2))
        .build()?;
    db.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            active BOOLEAN,
            balance DECIMAL(10,2),
            born DATE,
            seen DATETIME,
            meta JSON,
            avatar BLOB
        )",
        &[],
    )?;
    db.prepare(
        StatementKind::Insert,
        "add_user",
        "INSERT INTO users (name, active, balance, born, seen, meta, avatar)
         VALUES ($name, $active, $balance, $born, $seen, $meta, $avatar)",
    );
    db.prepare(
        StatementKind::Select,
        "user_by_id",
        "SELECT * FROM users WHERE id = $id",
    );
    Ok(db)
}

#[test]
fn sqlite_round_trips_typed_columns() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = users_db(&dir)?;

    let born = NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid date");
    let seen = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", "%Y-%m-%d %H:%M:%S")?;
    let inserted = db.execute_prepared(
        "add_user",
        &params! {
            "name" => "ada",
            "active" => true,
            "balance" => BigDecimal::from_str("12.50")?,
            "born" => born,
            "seen" => seen,
            "meta" => json!({"tags": ["admin"]}),
            "avatar" => vec![0xca_u8, 0xfe],
        },
        &ExecuteOptions::default(),
    )?;
    assert_eq!(inserted.insert_id(), Some(&RowValues::Int(1)));

    let found = db.execute_prepared("user_by_id", &params! { "id" => 1 }, &ExecuteOptions::default())?;
    let rows = found.rows().expect("select yields rows");
    assert_eq!(rows.len(), 1);
    let row = &rows.results[0];
    assert_eq!(row.get("name"), Some(&RowValues::Text("ada".to_string())));
    assert_eq!(row.get("active"), Some(&RowValues::Bool(true)));
    assert_eq!(
        row.get("balance").and_then(RowValues::as_decimal),
        Some(BigDecimal::from_str("12.5")?)
    );
    assert_eq!(row.get("born"), Some(&RowValues::Date(born)));
    assert_eq!(row.get("seen"), Some(&RowValues::Timestamp(seen)));
    assert_eq!(row.get("meta"), Some(&RowValues::JSON(json!({"tags": ["admin"]}))));
    assert_eq!(row.get("avatar"), Some(&RowValues::Blob(vec![0xca, 0xfe])));
    Ok(())
}

#[test]
fn sqlite_updates_deletes_and_datasets() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = users_db(&dir)?;
    for name in ["a", "b", "c"] {
        db.call(
            StatementKind::Insert,
            "INSERT INTO users (name, active) VALUES ($name, $active)",
            &params! { "name" => name, "active" => false },
            &ExecuteOptions::default(),
        )?;
    }

    let updated = db.call(
        StatementKind::Update,
        "UPDATE users SET active = $active WHERE name <> $name",
        &params! { "active" => true, "name" => "a" },
        &ExecuteOptions::default(),
    )?;
    assert_eq!(updated.affected(), Some(2));

    let mut active = db
        .dataset("SELECT name FROM users WHERE active = ?1 ORDER BY name")
        .with_params(vec![RowValues::Bool(true)]);
    let names: Vec<RowValues> = active
        .all()?
        .into_iter()
        .filter_map(|row| row.get("name").cloned())
        .collect();
    assert_eq!(names, vec![RowValues::from("b"), RowValues::from("c")]);
    assert_eq!(active.columns(), ["name".to_string()]);

    let deleted = db.execute("DELETE FROM users WHERE name = ?1", &[RowValues::from("b")])?;
    assert_eq!(deleted, 1);

    let count = db.fetch("SELECT count(*) AS n FROM users", &[])?;
    assert_eq!(count.results[0].get("n"), Some(&RowValues::Int(2)));
    Ok(())
}

#[test]
fn sqlite_constraint_violation_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = users_db(&dir)?;
    db.execute("INSERT INTO users (name) VALUES (?1)", &[RowValues::from("dup")])?;

    let err = db
        .execute("INSERT INTO users (name) VALUES (?1)", &[RowValues::from("dup")])
        .expect_err("unique violation");
    let db_err = err.as_database().expect("driver error");
    assert_eq!(db_err.code.as_deref(), Some("SQLITE_CONSTRAINT"));
    assert_eq!(db_err.class, ErrorClass::Fatal);

    // the connection survived and the table is intact
    let rows = db.fetch("SELECT name FROM users", &[])?;
    assert_eq!(rows.len(), 1);
    Ok(())
}

#[test]
fn sqlite_translates_postgres_placeholders_when_enabled() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("translate.db").to_string_lossy().into_owned();
    let db = Database::sqlite_builder(path)
        .translation(true)
        .pool(PoolOptions::default().with_max_size(1))
        .build()?;
    db.execute("CREATE TABLE t (a INTEGER, b TEXT)", &[])?;
    db.execute(
        "INSERT INTO t (a, b) VALUES ($1, $2)",
        &[RowValues::Int(7), RowValues::from("seven")],
    )?;

    let rows = db.fetch("SELECT b FROM t WHERE a = $1", &[RowValues::Int(7)])?;
    assert_eq!(rows.results[0].get("b"), Some(&RowValues::from("seven")));
    Ok(())
}
