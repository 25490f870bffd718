use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// A row from a database query result
///
/// Column order is the order the driver reported; names are shared with every
/// other row of the same fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
    // name -> index, shared the same way as the names
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

pub(crate) fn index_columns(column_names: &[String]) -> Arc<HashMap<String, usize>> {
    let mut cache = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // first occurrence wins for duplicate names
        cache.entry(name.clone()).or_insert(i);
    }
    Arc::new(cache)
}

impl CustomDbRow {
    /// Create a new database row
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names
    /// * `rows` - The values for this row
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let column_index_cache = index_columns(&column_names);
        Self {
            column_names,
            rows,
            column_index_cache,
        }
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index_cache: Arc<HashMap<String, usize>>,
        rows: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            rows,
            column_index_cache,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index_cache.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }

    /// Column/value pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.rows.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
