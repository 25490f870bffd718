use std::sync::atomic::{AtomicU64, Ordering};

use crate::driver::{BoxedDriver, BoxedResult, BufferedResult, Driver, DriverResult};
use crate::error::DriverError;
use crate::registry::{Reconcile, StatementRegistry};
use crate::types::RowValues;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

static EMPTY_RESULT: BufferedResult = BufferedResult {
    fields: Vec::new(),
    rows: Vec::new(),
    affected: 0,
};

/// Whether the pool may hand this connection out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Ok,
    Broken,
}

/// One physical backend session plus the statements prepared on it.
///
/// Every statement goes through a single failure policy: when the driver
/// fails and its liveness probe says the session is unhealthy, the session is
/// reset and the statement reissued exactly once. A healthy session means the
/// SQL itself was bad, so the error is returned untouched.
pub struct Connection {
    id: u64,
    driver: BoxedDriver,
    statements: StatementRegistry,
    liveness: Liveness,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("backend", &self.driver.backend_name())
            .field("statements", &self.statements)
            .field("liveness", &self.liveness)
            .finish()
    }
}

impl Connection {
    #[must_use]
    pub fn new(driver: BoxedDriver) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            driver,
            statements: StatementRegistry::new(),
            liveness: Liveness::Ok,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.driver.backend_name()
    }

    #[must_use]
    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.liveness == Liveness::Broken
    }

    /// Flag the session as unusable; the pool discards it on release.
    pub fn mark_broken(&mut self) {
        self.liveness = Liveness::Broken;
    }

    /// Probe the driver without any retry.
    pub fn is_healthy(&mut self) -> bool {
        self.driver.is_healthy()
    }

    #[must_use]
    pub fn insert_id_sql(&self) -> &str {
        self.driver.insert_id_sql()
    }

    /// Run a statement and return the affected row count.
    ///
    /// # Errors
    /// Returns the driver error after the retry policy has been applied.
    pub fn execute(&mut self, sql: &str, args: &[RowValues]) -> Result<u64, DriverError> {
        self.query(sql, args, |result| result.affected_rows())
    }

    /// Run a statement and hand its result to `consume`.
    ///
    /// The result handle is freed when `consume` returns or unwinds.
    ///
    /// # Errors
    /// Returns the driver error after the retry policy has been applied.
    pub fn query<R>(
        &mut self,
        sql: &str,
        args: &[RowValues],
        consume: impl FnOnce(&dyn DriverResult) -> R,
    ) -> Result<R, DriverError> {
        let handle = self.issue(|driver, _| {
            if args.is_empty() {
                driver.execute_statement(sql)
            } else {
                driver.execute_with_args(sql, args)
            }
        })?;
        Ok(self.consume(handle, consume))
    }

    /// Reconcile `name` with `sql` on this session, then execute it.
    ///
    /// After a session reset the statement is prepared again before the retry.
    ///
    /// # Errors
    /// Returns the PREPARE or EXECUTE error after the retry policy has been applied.
    pub fn query_prepared<R>(
        &mut self,
        name: &str,
        sql: &str,
        args: &[RowValues],
        consume: impl FnOnce(&dyn DriverResult) -> R,
    ) -> Result<R, DriverError> {
        let handle = self.issue(|driver, statements| {
            statements.ensure(&mut *driver, name, sql)?;
            driver.execute_named(name, args)
        })?;
        Ok(self.consume(handle, consume))
    }

    /// Prepare `name` without executing it.
    ///
    /// # Errors
    /// Returns the PREPARE error after the retry policy has been applied.
    pub fn prepare(&mut self, name: &str, sql: &str) -> Result<Reconcile, DriverError> {
        self.issue(|driver, statements| statements.ensure(driver, name, sql))
    }

    /// Deallocate `name` if this session has it prepared.
    ///
    /// # Errors
    /// Returns the DEALLOCATE error.
    pub fn deallocate(&mut self, name: &str) -> Result<bool, DriverError> {
        self.statements.deallocate(self.driver.as_mut(), name)
    }

    fn consume<R>(
        &mut self,
        handle: BoxedResult,
        consume: impl FnOnce(&dyn DriverResult) -> R,
    ) -> R {
        let guard = ResultGuard {
            driver: self.driver.as_mut(),
            handle: Some(handle),
        };
        consume(guard.result())
    }

    fn issue<T>(
        &mut self,
        mut op: impl FnMut(&mut dyn Driver, &mut StatementRegistry) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let first = match op(self.driver.as_mut(), &mut self.statements) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if self.driver.is_healthy() {
            return Err(first);
        }

        tracing::warn!(
            connection = self.id,
            backend = self.driver.backend_name(),
            error = %first,
            "connection unhealthy, resetting session and retrying once"
        );
        self.statements.forget_all();
        if let Err(reset_err) = self.driver.reset_session() {
            tracing::warn!(connection = self.id, error = %reset_err, "session reset failed");
            return Err(first.connection_lost());
        }

        match op(self.driver.as_mut(), &mut self.statements) {
            Ok(value) => Ok(value),
            Err(err) if self.driver.is_healthy() => Err(err),
            Err(err) => Err(err.connection_lost()),
        }
    }
}

/// Hands a result to its driver's `free_result` on every exit path.
struct ResultGuard<'a> {
    driver: &'a mut dyn Driver,
    handle: Option<BoxedResult>,
}

impl ResultGuard<'_> {
    fn result(&self) -> &dyn DriverResult {
        self.handle.as_deref().unwrap_or(&EMPTY_RESULT)
    }
}

impl Drop for ResultGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.driver.free_result(handle);
        }
    }
}
