//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::async_api::AsyncDatabase;
pub use crate::config::{DatabaseOptions, IdentifierCase, PoolOptions};
pub use crate::database::{Database, ExecOutcome, ExecuteOptions};
pub use crate::dataset::Dataset;
pub use crate::error::{DatabaseError, SqlAdapterError};
pub use crate::classify::ErrorClass;
pub use crate::placeholders::{BindPlan, PlaceholderStyle, TranslationMode, translate_placeholders};
pub use crate::pool::{ConnectionPool, DriverManager, MiddlewarePool};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::statement::{StatementKind, StatementTable};
pub use crate::types::{Params, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder};
