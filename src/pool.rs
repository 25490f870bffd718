use std::collections::HashMap;
use std::ops::DerefMut;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PoolOptions;
use crate::connection::Connection;
use crate::driver::BoxedDriver;
use crate::error::{DriverError, SqlAdapterError};

/// Source of physical connections for the execution facade.
///
/// A guard is held for exactly one logical operation and released by dropping
/// it. Connections marked broken (a Disconnect classification) must not be
/// handed out again.
pub trait ConnectionPool: Send + Sync {
    type Guard: DerefMut<Target = Connection>;

    /// Check out a connection, optionally from the pool registered under `server`.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConnectionError` when no connection can be obtained and
    /// `SqlAdapterError::ConfigError` for an unknown server tag.
    fn acquire(&self, server: Option<&str>) -> Result<Self::Guard, SqlAdapterError>;
}

type DriverFactory = dyn Fn() -> Result<BoxedDriver, DriverError> + Send + Sync;

/// `r2d2` manager that opens drivers through a factory and wraps them in [`Connection`]s.
#[derive(Clone)]
pub struct DriverManager {
    label: String,
    factory: Arc<DriverFactory>,
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverManager")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl DriverManager {
    pub fn new<F>(label: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<BoxedDriver, DriverError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            factory: Arc::new(factory),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl r2d2::ManageConnection for DriverManager {
    type Connection = Connection;
    type Error = DriverError;

    fn connect(&self) -> Result<Connection, DriverError> {
        let driver = (self.factory)()?;
        let conn = Connection::new(driver);
        tracing::debug!(pool = %self.label, connection = conn.id(), "opened connection");
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), DriverError> {
        if conn.is_healthy() {
            Ok(())
        } else {
            Err(DriverError::new("connection failed liveness probe").connection_lost())
        }
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        if conn.is_broken() {
            tracing::info!(pool = %self.label, connection = conn.id(), "evicting broken connection");
        }
        conn.is_broken()
    }
}

/// Default pool plus optional named pools selected by a server tag.
#[derive(Clone, Debug)]
pub struct MiddlewarePool {
    default: r2d2::Pool<DriverManager>,
    servers: HashMap<String, r2d2::Pool<DriverManager>>,
}

fn build_pool(
    manager: DriverManager,
    options: &PoolOptions,
) -> Result<r2d2::Pool<DriverManager>, SqlAdapterError> {
    options.validate()?;
    r2d2::Pool::builder()
        .max_size(options.max_size)
        .min_idle(options.min_idle)
        .connection_timeout(Duration::from_millis(options.connection_timeout_ms))
        .test_on_check_out(options.test_on_check_out)
        .build(manager)
        .map_err(|e| SqlAdapterError::ConnectionError(format!("pool creation failed: {e}")))
}

impl MiddlewarePool {
    /// Build the default pool.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConnectionError` if the pool cannot open its initial connections.
    pub fn new(manager: DriverManager, options: &PoolOptions) -> Result<Self, SqlAdapterError> {
        Ok(Self {
            default: build_pool(manager, options)?,
            servers: HashMap::new(),
        })
    }

    /// Register a pool reachable through `acquire(Some(tag))`.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConnectionError` if the pool cannot be built.
    pub fn with_server(
        mut self,
        tag: impl Into<String>,
        manager: DriverManager,
        options: &PoolOptions,
    ) -> Result<Self, SqlAdapterError> {
        self.servers.insert(tag.into(), build_pool(manager, options)?);
        Ok(self)
    }

    /// Connections currently open (idle and checked out) in the selected pool.
    #[must_use]
    pub fn connections(&self, server: Option<&str>) -> Option<u32> {
        self.select(server).ok().map(|pool| pool.state().connections)
    }

    fn select(&self, server: Option<&str>) -> Result<&r2d2::Pool<DriverManager>, SqlAdapterError> {
        match server {
            None => Ok(&self.default),
            Some(tag) => self
                .servers
                .get(tag)
                .ok_or_else(|| SqlAdapterError::ConfigError(format!("unknown server tag: {tag}"))),
        }
    }
}

impl ConnectionPool for MiddlewarePool {
    type Guard = r2d2::PooledConnection<DriverManager>;

    fn acquire(&self, server: Option<&str>) -> Result<Self::Guard, SqlAdapterError> {
        Ok(self.select(server)?.get()?)
    }
}
