use std::ops::ControlFlow;
use std::sync::Arc;

use crate::config::IdentifierCase;
use crate::database::Database;
use crate::decode::TypeDecoderTable;
use crate::driver::DriverResult;
use crate::error::SqlAdapterError;
use crate::pool::ConnectionPool;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

/// Turns driver results into rows using the decoder table.
#[derive(Clone, Copy)]
pub(crate) struct Materializer<'a> {
    pub(crate) decoders: &'a TypeDecoderTable,
    pub(crate) case: IdentifierCase,
}

impl Materializer<'_> {
    pub(crate) fn columns(&self, result: &dyn DriverResult) -> Arc<Vec<String>> {
        Arc::new(
            (0..result.field_count())
                .map(|field| self.case.apply(result.field_name(field)))
                .collect(),
        )
    }

    /// Decode row by row and hand each to `each`, stopping at its first error
    /// or break. Rows after the stop are never decoded.
    pub(crate) fn for_each_row(
        &self,
        result: &dyn DriverResult,
        columns: &Arc<Vec<String>>,
        mut each: impl FnMut(CustomDbRow) -> Result<ControlFlow<()>, SqlAdapterError>,
    ) -> Result<(), SqlAdapterError> {
        let index = crate::results::index_for(columns);
        let codes: Vec<u32> = (0..result.field_count())
            .map(|field| result.field_type(field))
            .collect();
        for row in 0..result.row_count() {
            let values = codes
                .iter()
                .enumerate()
                .map(|(field, code)| self.decoders.decode(*code, result.value(row, field)))
                .collect();
            let flow = each(CustomDbRow::with_index(
                Arc::clone(columns),
                Arc::clone(&index),
                values,
            ))?;
            if flow.is_break() {
                break;
            }
        }
        Ok(())
    }

    pub(crate) fn result_set(&self, result: &dyn DriverResult) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(result.row_count());
        result_set.set_column_names(self.columns(result));
        let codes: Vec<u32> = (0..result.field_count())
            .map(|field| result.field_type(field))
            .collect();
        for row in 0..result.row_count() {
            let values = codes
                .iter()
                .enumerate()
                .map(|(field, code)| self.decoders.decode(*code, result.value(row, field)))
                .collect();
            result_set.add_row_values(values);
        }
        if result.field_count() == 0 {
            result_set.rows_affected = usize::try_from(result.affected_rows()).unwrap_or(usize::MAX);
        }
        result_set
    }

    /// First column of the first row, `Null` when there is none.
    pub(crate) fn first_value(&self, result: &dyn DriverResult) -> RowValues {
        if result.row_count() == 0 || result.field_count() == 0 {
            return RowValues::Null;
        }
        self.decoders.decode(result.field_type(0), result.value(0, 0))
    }
}

/// A query whose rows are decoded lazily, one at a time, on every fetch.
///
/// The column list is replaced by each fetch and can be read afterwards:
/// ```rust,no_run
/// # use sql_adapter::prelude::*;
/// # fn demo(db: &Database) -> Result<(), SqlAdapterError> {
/// let mut ds = db.dataset("SELECT id, name FROM users WHERE id > ?1").with_params(vec![RowValues::Int(10)]);
/// ds.each(|row| {
///     println!("{:?}", row.get("name"));
///     Ok(())
/// })?;
/// assert_eq!(ds.columns(), ["id", "name"]);
/// # Ok(())
/// # }
/// ```
pub struct Dataset<'db, P: ConnectionPool> {
    db: &'db Database<P>,
    sql: String,
    params: Vec<RowValues>,
    server: Option<String>,
    columns: Arc<Vec<String>>,
}

impl<'db, P: ConnectionPool> Dataset<'db, P> {
    pub(crate) fn new(db: &'db Database<P>, sql: impl Into<String>) -> Self {
        Self {
            db,
            sql: sql.into(),
            params: Vec::new(),
            server: None,
            columns: Arc::new(Vec::new()),
        }
    }

    /// Positional arguments for the query's `$N`/`?N` placeholders.
    #[must_use]
    pub fn with_params(mut self, params: Vec<RowValues>) -> Self {
        self.params = params;
        self
    }

    /// Run against the pool registered under `tag`.
    #[must_use]
    pub fn server(mut self, tag: impl Into<String>) -> Self {
        self.server = Some(tag.into());
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Columns discovered by the most recent fetch, empty if it returned no rows.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Run the query and pass each decoded row to `f`.
    ///
    /// The connection is released before this returns, including when `f` fails.
    ///
    /// # Errors
    /// Returns the canonical database error, or the first error `f` returns.
    pub fn each(
        &mut self,
        mut f: impl FnMut(CustomDbRow) -> Result<(), SqlAdapterError>,
    ) -> Result<(), SqlAdapterError> {
        self.stream(|row| f(row).map(|()| ControlFlow::Continue(())))
    }

    fn stream(
        &mut self,
        each: impl FnMut(CustomDbRow) -> Result<ControlFlow<()>, SqlAdapterError>,
    ) -> Result<(), SqlAdapterError> {
        let columns = &mut self.columns;
        self.db.stream_rows(
            &self.sql,
            &self.params,
            self.server.as_deref(),
            |discovered| *columns = discovered,
            each,
        )
    }

    /// Run the query and collect every row.
    ///
    /// # Errors
    /// Returns the canonical database error.
    pub fn all(&mut self) -> Result<Vec<CustomDbRow>, SqlAdapterError> {
        let mut rows = Vec::new();
        self.each(|row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Run the query and keep the first row. Later rows are not decoded.
    ///
    /// # Errors
    /// Returns the canonical database error.
    pub fn first(&mut self) -> Result<Option<CustomDbRow>, SqlAdapterError> {
        let mut first = None;
        self.stream(|row| {
            first = Some(row);
            Ok(ControlFlow::Break(()))
        })?;
        Ok(first)
    }
}
