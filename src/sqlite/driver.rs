use std::collections::HashMap;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{ErrorCode, OpenFlags, Statement, params_from_iter};

use crate::decode::oid;
use crate::driver::{BoxedResult, BufferedResult, Driver};
use crate::error::DriverError;
use crate::types::RowValues;

use super::params;

const STATEMENT_CACHE_CAPACITY: usize = 64;

/// [`Driver`] over one `rusqlite::Connection`.
///
/// SQLite has no server-side named statements, so names map to SQL here and
/// the compiled statements live in rusqlite's statement cache.
pub struct SqliteDriver {
    conn: rusqlite::Connection,
    path: String,
    flags: OpenFlags,
    busy_timeout: Duration,
    named: HashMap<String, String>,
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("path", &self.path)
            .field("named", &self.named)
            .finish_non_exhaustive()
    }
}

impl SqliteDriver {
    /// Open `path` (or `:memory:`) with `flags`.
    ///
    /// # Errors
    /// Returns the open error with `connection_lost` set.
    pub fn open(
        path: impl Into<String>,
        flags: OpenFlags,
        busy_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let path = path.into();
        let conn = open_connection(&path, flags, busy_timeout)?;
        Ok(Self {
            conn,
            path,
            flags,
            busy_timeout,
            named: HashMap::new(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Switch the database file to WAL journaling.
    ///
    /// # Errors
    /// Returns the pragma's error.
    pub fn enable_wal(&self) -> Result<(), DriverError> {
        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(driver_error)?;
        tracing::debug!(path = %self.path, journal_mode = %mode, "journal mode set");
        Ok(())
    }

    fn run(&self, sql: &str, args: &[RowValues]) -> Result<BufferedResult, DriverError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(driver_error)?;
        run_statement(&mut stmt, args)
    }
}

fn open_connection(
    path: &str,
    flags: OpenFlags,
    busy_timeout: Duration,
) -> Result<rusqlite::Connection, DriverError> {
    let conn = rusqlite::Connection::open_with_flags(path, flags)
        .map_err(|e| driver_error(e).connection_lost())?;
    conn.busy_timeout(busy_timeout).map_err(driver_error)?;
    conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    Ok(conn)
}

impl Driver for SqliteDriver {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn execute_statement(&mut self, sql: &str) -> Result<BoxedResult, DriverError> {
        Ok(Box::new(self.run(sql, &[])?))
    }

    fn execute_with_args(
        &mut self,
        sql: &str,
        args: &[RowValues],
    ) -> Result<BoxedResult, DriverError> {
        Ok(Box::new(self.run(sql, args)?))
    }

    fn prepare_named(&mut self, name: &str, sql: &str) -> Result<(), DriverError> {
        if self.named.contains_key(name) {
            return Err(
                DriverError::new(format!("prepared statement \"{name}\" already exists"))
                    .with_code("42P05"),
            );
        }
        // Compile now so bad SQL fails at PREPARE time, and keep it cached.
        self.conn.prepare_cached(sql).map_err(driver_error)?;
        self.named.insert(name.to_string(), sql.to_string());
        Ok(())
    }

    fn deallocate_named(&mut self, name: &str) -> Result<(), DriverError> {
        match self.named.remove(name) {
            Some(_) => Ok(()),
            None => Err(unknown_statement(name)),
        }
    }

    fn execute_named(
        &mut self,
        name: &str,
        args: &[RowValues],
    ) -> Result<BoxedResult, DriverError> {
        let sql = self
            .named
            .get(name)
            .ok_or_else(|| unknown_statement(name))?;
        Ok(Box::new(self.run(sql, args)?))
    }

    fn is_healthy(&mut self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    fn reset_session(&mut self) -> Result<(), DriverError> {
        let conn = open_connection(&self.path, self.flags, self.busy_timeout)?;
        let stale = std::mem::replace(&mut self.conn, conn);
        if let Err((_, err)) = stale.close() {
            tracing::debug!(path = %self.path, error = %err, "closing stale sqlite handle failed");
        }
        self.named.clear();
        Ok(())
    }

    fn insert_id_sql(&self) -> &str {
        "SELECT last_insert_rowid()"
    }
}

fn unknown_statement(name: &str) -> DriverError {
    DriverError::new(format!("prepared statement \"{name}\" does not exist")).with_code("26000")
}

fn run_statement(
    stmt: &mut Statement<'_>,
    args: &[RowValues],
) -> Result<BufferedResult, DriverError> {
    let values = params::convert(args);
    if stmt.column_count() == 0 {
        let affected = stmt
            .execute(params_from_iter(values.iter()))
            .map_err(driver_error)?;
        return Ok(BufferedResult::affected(
            u64::try_from(affected).unwrap_or(u64::MAX),
        ));
    }

    let declared: Vec<(String, Option<u32>)> = stmt
        .columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                column.decl_type().map(declared_type_code),
            )
        })
        .collect();
    let mut observed: Vec<Option<u32>> = vec![None; declared.len()];
    let mut result = BufferedResult::default();

    let mut rows = stmt
        .query(params_from_iter(values.iter()))
        .map_err(driver_error)?;
    while let Some(row) = rows.next().map_err(driver_error)? {
        let mut cells = Vec::with_capacity(declared.len());
        for (idx, (_, declared_code)) in declared.iter().enumerate() {
            let value = row.get_ref(idx).map_err(driver_error)?;
            if observed[idx].is_none() {
                observed[idx] = storage_type_code(value);
            }
            cells.push(render_cell(value, declared_code.or(observed[idx])));
        }
        result.rows.push(cells);
    }

    result.affected = u64::try_from(result.rows.len()).unwrap_or(u64::MAX);
    result.fields = declared
        .into_iter()
        .zip(observed)
        .map(|((name, declared_code), observed_code)| {
            (name, declared_code.or(observed_code).unwrap_or(oid::TEXT))
        })
        .collect();
    Ok(result)
}

/// Map a declared column type onto a type code, following SQLite's affinity
/// rules where they overlap.
fn declared_type_code(decl: &str) -> u32 {
    let decl = decl.to_ascii_uppercase();
    if decl.contains("BOOL") {
        oid::BOOL
    } else if decl.contains("INT") {
        oid::INT8
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        oid::FLOAT8
    } else if decl.contains("NUMERIC") || decl.contains("DECIMAL") {
        oid::NUMERIC
    } else if decl.contains("BLOB") || decl.contains("BYTEA") {
        oid::BYTEA
    } else if decl.starts_with("TIMETZ") || decl.starts_with("TIME WITH") {
        // no zoned time-of-day value; keep the text as stored
        oid::TEXT
    } else if decl.contains("TIMESTAMPTZ") || decl.contains("WITH TIME ZONE") {
        oid::TIMESTAMPTZ
    } else if decl.contains("DATETIME") || decl.contains("TIMESTAMP") {
        oid::TIMESTAMP
    } else if decl.starts_with("DATE") {
        oid::DATE
    } else if decl.starts_with("TIME") {
        oid::TIME
    } else if decl.contains("JSON") {
        oid::JSON
    } else {
        oid::TEXT
    }
}

fn storage_type_code(value: ValueRef<'_>) -> Option<u32> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(_) => Some(oid::INT8),
        ValueRef::Real(_) => Some(oid::FLOAT8),
        ValueRef::Text(_) => Some(oid::TEXT),
        ValueRef::Blob(_) => Some(oid::BYTEA),
    }
}

fn render_cell(value: ValueRef<'_>, code: Option<u32>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) if code == Some(oid::BOOL) => {
            Some(if i == 0 { "f" } else { "t" }.to_string())
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Some(format!("\\x{}", hex::encode(bytes))),
    }
}

fn error_code_name(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::DatabaseBusy => "SQLITE_BUSY",
        ErrorCode::DatabaseLocked => "SQLITE_LOCKED",
        ErrorCode::CannotOpen => "SQLITE_CANTOPEN",
        ErrorCode::NotADatabase => "SQLITE_NOTADB",
        ErrorCode::SystemIoFailure => "SQLITE_IOERR",
        ErrorCode::DatabaseCorrupt => "SQLITE_CORRUPT",
        ErrorCode::ConstraintViolation => "SQLITE_CONSTRAINT",
        ErrorCode::ReadOnly => "SQLITE_READONLY",
        ErrorCode::TypeMismatch => "SQLITE_MISMATCH",
        ErrorCode::DiskFull => "SQLITE_FULL",
        ErrorCode::SchemaChanged => "SQLITE_SCHEMA",
        ErrorCode::OperationInterrupted => "SQLITE_INTERRUPT",
        _ => "SQLITE_ERROR",
    }
}

/// Translate a rusqlite error into the driver contract's error.
pub(crate) fn driver_error(err: rusqlite::Error) -> DriverError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            let lost = matches!(
                failure.code,
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure
            );
            let out = DriverError::new(err.to_string()).with_code(error_code_name(failure.code));
            if lost { out.connection_lost() } else { out }
        }
        _ => DriverError::new(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverResult;

    fn memory() -> SqliteDriver {
        SqliteDriver::open(":memory:", OpenFlags::default(), Duration::from_millis(100))
            .expect("in-memory database")
    }

    #[test]
    fn declared_types_drive_type_codes() {
        assert_eq!(declared_type_code("INTEGER"), oid::INT8);
        assert_eq!(declared_type_code("boolean"), oid::BOOL);
        assert_eq!(declared_type_code("DATETIME"), oid::TIMESTAMP);
        assert_eq!(declared_type_code("DATE"), oid::DATE);
        assert_eq!(declared_type_code("TIME"), oid::TIME);
        assert_eq!(declared_type_code("time with time zone"), oid::TEXT);
        assert_eq!(declared_type_code("TIMETZ"), oid::TEXT);
        assert_eq!(declared_type_code("TIMESTAMP WITH TIME ZONE"), oid::TIMESTAMPTZ);
        assert_eq!(declared_type_code("timestamptz"), oid::TIMESTAMPTZ);
        assert_eq!(declared_type_code("DECIMAL(10,2)"), oid::NUMERIC);
        assert_eq!(declared_type_code("VARCHAR(20)"), oid::TEXT);
    }

    #[test]
    fn expression_columns_use_storage_class() {
        let mut driver = memory();
        let result = driver
            .execute_statement("SELECT 1 AS x, 2.5 AS y, NULL AS z, x'0aff' AS b")
            .expect("select");
        assert_eq!(result.field_type(0), oid::INT8);
        assert_eq!(result.field_type(1), oid::FLOAT8);
        assert_eq!(result.field_type(2), oid::TEXT);
        assert_eq!(result.field_type(3), oid::BYTEA);
        assert_eq!(result.value(0, 0), Some("1"));
        assert_eq!(result.value(0, 2), None);
        assert_eq!(result.value(0, 3), Some("\\x0aff"));
    }

    #[test]
    fn named_statements_are_emulated() {
        let mut driver = memory();
        driver.prepare_named("one", "SELECT ?1 + 1").expect("prepare");
        let err = driver.prepare_named("one", "SELECT 2").expect_err("duplicate");
        assert_eq!(err.code.as_deref(), Some("42P05"));

        let result = driver
            .execute_named("one", &[RowValues::Int(41)])
            .expect("execute");
        assert_eq!(result.value(0, 0), Some("42"));

        driver.deallocate_named("one").expect("deallocate");
        assert!(driver.deallocate_named("one").is_err());
        assert!(driver.execute_named("one", &[]).is_err());
    }

    #[test]
    fn reset_forgets_named_statements() {
        let mut driver = memory();
        driver.prepare_named("q", "SELECT 1").expect("prepare");
        driver.reset_session().expect("reset");
        assert!(driver.is_healthy());
        assert!(driver.execute_named("q", &[]).is_err());
    }

    #[test]
    fn syntax_errors_carry_a_code_and_keep_the_session() {
        let mut driver = memory();
        let err = driver.execute_statement("SELEC 1").err().expect("syntax");
        assert!(err.code.is_some());
        assert!(!err.connection_lost);
        assert!(driver.is_healthy());
    }
}
