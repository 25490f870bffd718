//! Async entry points over the blocking [`Database`] facade.
//!
//! Each call runs on tokio's blocking thread pool; nothing here spawns
//! threads of its own. Call from inside a tokio runtime.

use std::sync::Arc;

use tokio::task::spawn_blocking;

use crate::database::{Database, ExecOutcome, ExecuteOptions};
use crate::error::SqlAdapterError;
use crate::pool::{ConnectionPool, MiddlewarePool};
use crate::results::ResultSet;
use crate::statement::{PreparedStatement, StatementKind};
use crate::types::{Params, RowValues};

/// Cloneable async handle sharing one [`Database`].
pub struct AsyncDatabase<P: ConnectionPool = MiddlewarePool> {
    inner: Arc<Database<P>>,
}

impl<P: ConnectionPool> Clone for AsyncDatabase<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: ConnectionPool> std::fmt::Debug for AsyncDatabase<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AsyncDatabase").field(&self.inner).finish()
    }
}

impl<P: ConnectionPool> From<Database<P>> for AsyncDatabase<P> {
    fn from(db: Database<P>) -> Self {
        Self {
            inner: Arc::new(db),
        }
    }
}

impl<P: ConnectionPool + 'static> AsyncDatabase<P> {
    #[must_use]
    pub fn new(inner: Arc<Database<P>>) -> Self {
        Self { inner }
    }

    /// The blocking facade, for callers already on a blocking thread.
    #[must_use]
    pub fn blocking(&self) -> &Database<P> {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> Result<T, SqlAdapterError>
    where
        T: Send + 'static,
        F: FnOnce(&Database<P>) -> Result<T, SqlAdapterError> + Send + 'static,
    {
        let db = Arc::clone(&self.inner);
        spawn_blocking(move || op(&db))
            .await
            .map_err(|e| SqlAdapterError::Other(format!("blocking task failed: {e}")))?
    }

    /// # Errors
    /// See [`Database::execute`].
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: Vec<RowValues>,
    ) -> Result<u64, SqlAdapterError> {
        let sql = sql.into();
        self.run(move |db| db.execute(&sql, &params)).await
    }

    /// # Errors
    /// See [`Database::fetch`].
    pub async fn fetch(
        &self,
        sql: impl Into<String>,
        params: Vec<RowValues>,
    ) -> Result<ResultSet, SqlAdapterError> {
        let sql = sql.into();
        self.run(move |db| db.fetch(&sql, &params)).await
    }

    /// Registering a statement does not block, so this runs inline.
    pub fn prepare(&self, kind: StatementKind, name: &str, template: &str) -> Arc<PreparedStatement> {
        self.inner.prepare(kind, name, template)
    }

    /// # Errors
    /// See [`Database::execute_prepared`].
    pub async fn execute_prepared(
        &self,
        name: impl Into<String>,
        values: Params,
        opts: ExecuteOptions,
    ) -> Result<ExecOutcome, SqlAdapterError> {
        let name = name.into();
        self.run(move |db| db.execute_prepared(&name, &values, &opts))
            .await
    }

    /// # Errors
    /// See [`Database::call`].
    pub async fn call(
        &self,
        kind: StatementKind,
        template: impl Into<String>,
        values: Params,
        opts: ExecuteOptions,
    ) -> Result<ExecOutcome, SqlAdapterError> {
        let template = template.into();
        self.run(move |db| db.call(kind, &template, &values, &opts))
            .await
    }
}
