//! Database adapter layer: one execution contract over native client drivers.
//!
//! A [`Database`] owns a connection pool and runs plain SQL, ad hoc bound
//! calls and named prepared statements. Each physical [`Connection`] keeps
//! its own registry of server-side statements and reconciles it against the
//! shared [`StatementTable`] before every prepared execution. Wire values are
//! decoded through a [`TypeDecoderTable`], and driver failures are classified
//! by an [`ErrorClassifier`] so lost connections are evicted rather than reused.
//!
//! ```rust,no_run
//! use sql_adapter::prelude::*;
//! use sql_adapter::params;
//!
//! # fn main() -> Result<(), SqlAdapterError> {
//! let db = Database::sqlite_builder("app.db".to_string()).build()?;
//! db.execute("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)", &[])?;
//!
//! db.prepare(StatementKind::Insert, "add_user", "INSERT INTO users (name) VALUES ($name)");
//! let id = db.execute_prepared("add_user", &params! { "name" => "alice" }, &ExecuteOptions::default())?;
//! println!("{:?}", id.insert_id());
//! # Ok(())
//! # }
//! ```

pub mod async_api;
pub mod classify;
pub mod config;
pub mod connection;
pub mod database;
pub mod dataset;
pub mod decode;
pub mod driver;
pub mod error;
pub mod placeholders;
pub mod pool;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod statement;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use async_api::AsyncDatabase;
pub use classify::{ClassifierConfig, ErrorClass, ErrorClassifier};
pub use config::{DatabaseOptions, IdentifierCase, PoolOptions};
pub use connection::{Connection, Liveness};
pub use database::{Database, ExecOutcome, ExecuteOptions};
pub use dataset::Dataset;
pub use decode::TypeDecoderTable;
pub use driver::{BufferedResult, Driver, DriverResult};
pub use error::{DatabaseError, DriverError, SqlAdapterError};
pub use placeholders::{BindPlan, PlaceholderStyle, TranslationMode, translate_placeholders};
pub use pool::{ConnectionPool, DriverManager, MiddlewarePool};
pub use registry::{Reconcile, StatementRegistry};
pub use results::{CustomDbRow, ResultSet};
pub use statement::{PreparedStatement, StatementKind, StatementTable};
pub use types::{Params, RowValues};
