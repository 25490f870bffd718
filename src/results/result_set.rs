use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::types::RowValues;

/// A fully materialized query result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (for DML statements) or returned
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(index_columns(&column_names));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set. Ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(names), Some(index)) = (&self.column_names, &self.column_index) {
            self.results.push(CustomDbRow::with_index(
                Arc::clone(names),
                Arc::clone(index),
                row_values,
            ));
            self.rows_affected += 1;
        }
    }

    /// Add an already built row, adopting its column names if none are set yet.
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_index = Some(Arc::clone(&row.column_index_cache));
            self.column_names = Some(Arc::clone(&row.column_names));
        }

        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
