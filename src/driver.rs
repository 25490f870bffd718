//! Contract every native client library is adapted to.
//!
//! One implementation exists per backend/native-library pairing. Capabilities a
//! library lacks are emulated inside its implementation (the SQLite driver keeps
//! named statements in its own map, for example), so nothing above this trait
//! probes for optional methods.

use crate::error::DriverError;
use crate::types::RowValues;

/// A result handle produced by a [`Driver`].
///
/// Values are exposed as backend text; decoding into [`RowValues`] happens in
/// the [`TypeDecoderTable`](crate::decode::TypeDecoderTable).
pub trait DriverResult: Send {
    fn row_count(&self) -> usize;

    /// Rows changed by a DML statement, or rows returned by a query.
    fn affected_rows(&self) -> u64;

    fn field_count(&self) -> usize;

    fn field_name(&self, field: usize) -> &str;

    /// Backend type code for the column, see [`oid`](crate::decode::oid).
    fn field_type(&self, field: usize) -> u32;

    /// Cell text, `None` for SQL NULL or an out-of-range position.
    fn value(&self, row: usize, field: usize) -> Option<&str>;
}

pub type BoxedResult = Box<dyn DriverResult>;

/// One physical backend session.
pub trait Driver: Send {
    /// Short backend label used in log events.
    fn backend_name(&self) -> &'static str;

    /// Run SQL without arguments.
    ///
    /// # Errors
    /// Returns the driver's error for the statement.
    fn execute_statement(&mut self, sql: &str) -> Result<BoxedResult, DriverError>;

    /// Run SQL with positional arguments (`$1`/`?1` placeholders).
    ///
    /// # Errors
    /// Returns the driver's error for the statement.
    fn execute_with_args(
        &mut self,
        sql: &str,
        args: &[RowValues],
    ) -> Result<BoxedResult, DriverError>;

    /// Create a server-side statement called `name`.
    ///
    /// # Errors
    /// Returns the driver's error when the SQL does not prepare or the name is taken.
    fn prepare_named(&mut self, name: &str, sql: &str) -> Result<(), DriverError>;

    /// Drop the server-side statement called `name`.
    ///
    /// # Errors
    /// Returns the driver's error, including when no such statement exists.
    fn deallocate_named(&mut self, name: &str) -> Result<(), DriverError>;

    /// Run a previously prepared statement.
    ///
    /// # Errors
    /// Returns the driver's error for the execution.
    fn execute_named(
        &mut self,
        name: &str,
        args: &[RowValues],
    ) -> Result<BoxedResult, DriverError>;

    /// Release a result handle. The default just drops it.
    fn free_result(&mut self, result: BoxedResult) {
        drop(result);
    }

    /// Liveness probe used after a failure.
    fn is_healthy(&mut self) -> bool;

    /// Replace the physical session. Server-side statements do not survive.
    ///
    /// # Errors
    /// Returns the driver's error when a new session cannot be opened.
    fn reset_session(&mut self) -> Result<(), DriverError>;

    /// Query returning the id of the last inserted row on this session.
    fn insert_id_sql(&self) -> &str {
        "SELECT lastval()"
    }
}

pub type BoxedDriver = Box<dyn Driver>;

/// A fully buffered result, the shape most native libraries hand back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedResult {
    pub fields: Vec<(String, u32)>,
    pub rows: Vec<Vec<Option<String>>>,
    pub affected: u64,
}

impl BufferedResult {
    /// Result of a statement that returned no rows.
    #[must_use]
    pub fn affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, type_code: u32) -> Self {
        self.fields.push((name.into(), type_code));
        self
    }

    /// Append a row of cell texts; each row counts as one affected row.
    #[must_use]
    pub fn with_row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.rows
            .push(cells.into_iter().map(|cell| cell.map(Into::into)).collect());
        self.affected += 1;
        self
    }
}

impl DriverResult for BufferedResult {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn field_name(&self, field: usize) -> &str {
        self.fields.get(field).map_or("", |(name, _)| name.as_str())
    }

    fn field_type(&self, field: usize) -> u32 {
        self.fields
            .get(field)
            .map_or(crate::decode::oid::TEXT, |(_, code)| *code)
    }

    fn value(&self, row: usize, field: usize) -> Option<&str> {
        self.rows.get(row)?.get(field)?.as_deref()
    }
}
