use std::time::Duration;

use rusqlite::OpenFlags;

use crate::config::{DatabaseOptions, PoolOptions};
use crate::database::Database;
use crate::driver::BoxedDriver;
use crate::error::SqlAdapterError;
use crate::placeholders::PlaceholderStyle;
use crate::pool::{DriverManager, MiddlewarePool};

use super::driver::SqliteDriver;

/// Options for configuring a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub translate_placeholders: bool,
    pub pool: PoolOptions,
    pub flags: OpenFlags,
    pub busy_timeout: Duration,
    /// Switch file databases to WAL journaling when the pool is built.
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            translate_placeholders: false,
            pool: PoolOptions::default(),
            flags: OpenFlags::default(),
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }

    #[must_use]
    pub fn with_translation(mut self, translate_placeholders: bool) -> Self {
        self.translate_placeholders = translate_placeholders;
        self
    }

    fn is_memory(&self) -> bool {
        self.db_path == ":memory:" || self.db_path.is_empty()
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn translation(mut self, translate_placeholders: bool) -> Self {
        self.opts.translate_placeholders = translate_placeholders;
        self
    }

    #[must_use]
    pub fn pool(mut self, pool: PoolOptions) -> Self {
        self.opts.pool = pool;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.opts.flags = flags;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a pooled [`Database`] using `?N` placeholders.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConnectionError` if the pool cannot be created
    /// or the database cannot be opened.
    pub fn build(self) -> Result<Database, SqlAdapterError> {
        Database::new_sqlite(self.finish())
    }
}

impl Database {
    #[must_use]
    pub fn sqlite_builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Open a pooled `SQLite` database.
    ///
    /// # Errors
    /// Returns `SqlAdapterError::ConnectionError` if pool creation or the
    /// initial open fails.
    pub fn new_sqlite(opts: SqliteOptions) -> Result<Self, SqlAdapterError> {
        if opts.wal && !opts.is_memory() {
            let driver = SqliteDriver::open(&opts.db_path, opts.flags, opts.busy_timeout)
                .map_err(|e| SqlAdapterError::ConnectionError(format!("failed to open SQLite database: {e}")))?;
            driver.enable_wal().map_err(|e| {
                SqlAdapterError::ConnectionError(format!("failed to enable WAL: {e}"))
            })?;
        }

        let path = opts.db_path.clone();
        let flags = opts.flags;
        let busy_timeout = opts.busy_timeout;
        let manager = DriverManager::new(format!("sqlite:{path}"), move || {
            SqliteDriver::open(path.clone(), flags, busy_timeout)
                .map(|driver| Box::new(driver) as BoxedDriver)
        });
        let pool = MiddlewarePool::new(manager, &opts.pool)?;

        let options = DatabaseOptions::default()
            .with_placeholder_style(PlaceholderStyle::Sqlite)
            .with_translation(opts.translate_placeholders)
            .with_pool(opts.pool);
        tracing::debug!(path = %opts.db_path, "sqlite database ready");
        Database::new(pool, options)
    }
}
