use std::sync::Arc;

use crate::driver::RawResult;
use crate::error::DriverError;
use crate::types::Value;

/// A row from a query result, with access by index or by column name.
#[derive(Debug, Clone)]
pub struct Row {
    /// The column names for this row (shared across all rows in a result set)
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    /// Get a value by column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|col| col == column_name)?;
        self.values.get(idx)
    }

    /// Get a value by column index.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All values of this row, in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Normalized result of a statement execution: columns in driver-reported
/// order, rows in fetch order, values in their driver-native
/// representation.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<Vec<String>>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Assemble a result set from column names and raw row tuples.
    #[must_use]
    pub fn from_parts(columns: Arc<Vec<String>>, rows: Vec<Vec<Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| Row {
                columns: Arc::clone(&columns),
                values,
            })
            .collect();
        Self { columns, rows }
    }

    /// Column names in driver-reported order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in fetch order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
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

/// Normalize a raw driver result, releasing it on both the success and the
/// error path.
///
/// # Errors
///
/// Propagates the driver's error when rows cannot be fetched; the raw
/// result is freed regardless.
pub fn from_raw<R: RawResult>(mut raw: R) -> Result<ResultSet, DriverError> {
    let columns = Arc::new(raw.columns());
    let fetched = raw.fetch_all();
    raw.free();
    Ok(ResultSet::from_parts(columns, fetched?))
}
