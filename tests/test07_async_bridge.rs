use sql_adapter::decode::oid;
use sql_adapter::params;
use sql_adapter::prelude::*;
use sql_adapter::test_utils::{DriverCall, FakeHandle};
use sql_adapter::BufferedResult;
use tokio::runtime::Runtime;

#[test]
fn async_calls_run_the_blocking_facade() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let fake = FakeHandle::default();
    let pool = MiddlewarePool::new(
        fake.manager(),
        &PoolOptions::default().with_max_size(2).with_test_on_check_out(false),
    )?;
    let db = AsyncDatabase::from(Database::new(pool, DatabaseOptions::default())?);
    fake.respond(
        "SELECT 1 AS x",
        BufferedResult::default()
            .with_field("x", oid::INT4)
            .with_row([Some("1")]),
    );

    rt.block_on(async {
        let affected = db
            .execute("UPDATE t SET a = $1", vec![RowValues::Int(3)])
            .await?;
        assert_eq!(affected, 1);

        let rows = db.fetch("SELECT 1 AS x", Vec::new()).await?;
        assert_eq!(rows.results[0].get("x"), Some(&RowValues::Int(1)));

        db.prepare(StatementKind::Delete, "purge", "DELETE FROM t WHERE a = $a");
        let outcome = db
            .execute_prepared("purge", params! { "a" => 3 }, ExecuteOptions::default())
            .await?;
        assert_eq!(outcome.affected(), Some(1));

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.call(
                        StatementKind::Update,
                        "UPDATE t SET a = $a",
                        params! { "a" => n },
                        ExecuteOptions::default(),
                    )
                    .await
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await??.affected(), Some(1));
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    assert_eq!(
        fake.count(|c| matches!(c, DriverCall::ExecuteWithArgs(sql, _) if sql == "UPDATE t SET a = $1")),
        5
    );
    Ok(())
}

#[test]
fn async_usage_errors_come_back_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let fake = FakeHandle::default();
    let pool = MiddlewarePool::new(fake.manager(), &PoolOptions::default())?;
    let db = AsyncDatabase::from(Database::new(pool, DatabaseOptions::default())?);

    let err = rt
        .block_on(db.execute_prepared("nope", Params::new(), ExecuteOptions::default()))
        .expect_err("unknown statement");
    assert!(matches!(err, SqlAdapterError::UnknownStatement(_)));
    Ok(())
}
