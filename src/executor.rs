//! Statement execution pipeline: prepare-or-reuse, bind, execute, fetch
//! metadata, yield result, release.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::adapter::Adapter;
use crate::driver::{ConnStmt, Connection, Driver, PreparedStatement};
use crate::error::{AdapterError, DriverError};
use crate::results::{self, ResultSet};
use crate::types::Value;

impl<D: Driver> Adapter<D> {
    /// Execute `sql` with the given bind values and return the normalized
    /// result.
    ///
    /// Bind-carrying statements are prepared once and reused through the
    /// statement cache; bind-less statements are prepared fresh and closed
    /// immediately, since they carry no reusable parameter shape and some
    /// statement forms cannot run through the prepared-statement API at
    /// all (use [`Adapter::execute_direct`] for those).
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Execution` when the driver rejects the
    /// statement; the offending cached statement is closed and evicted
    /// first, and no retry is attempted at this layer.
    pub fn execute(&mut self, sql: &str, binds: &[Value]) -> Result<ResultSet, AdapterError> {
        let params = coerce_binds(binds);
        self.with_statement(sql, binds.is_empty(), |stmt, columns| {
            fetch_result(stmt, &params, columns)
        })
    }

    /// Identical pipeline to [`Adapter::execute`], yielding the driver's
    /// affected-row count instead of row data.
    ///
    /// # Errors
    ///
    /// Same error behavior as [`Adapter::execute`].
    pub fn execute_mutation(&mut self, sql: &str, binds: &[Value]) -> Result<u64, AdapterError> {
        let params = coerce_binds(binds);
        self.with_statement(sql, binds.is_empty(), |stmt, _columns| {
            stmt.execute(&params)?;
            let affected = stmt.affected_rows();
            stmt.free_result();
            Ok(affected)
        })
    }

    /// Run `sql` outside the prepared-statement API, reading columns and
    /// rows eagerly. No caching applies.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Execution` when the driver rejects the
    /// statement.
    pub fn execute_direct(&mut self, sql: &str) -> Result<ResultSet, AdapterError> {
        let (conn, _cache, _pid) = self.parts_mut()?;
        trace!(sql, "direct execution");
        match conn.query(sql).map_err(AdapterError::Execution)? {
            Some(raw) => results::from_raw(raw).map_err(AdapterError::Execution),
            None => Ok(ResultSet::default()),
        }
    }

    /// Run an insert and resolve its row identifier: the supplied value
    /// when the caller provided one, otherwise the connection's last
    /// generated id.
    ///
    /// # Errors
    ///
    /// Same error behavior as [`Adapter::execute_mutation`].
    pub fn execute_insert(
        &mut self,
        sql: &str,
        binds: &[Value],
        id_value: Option<u64>,
    ) -> Result<Option<u64>, AdapterError> {
        self.execute_mutation(sql, binds)?;
        match id_value {
            Some(id) => Ok(Some(id)),
            None => self.last_insert_id(),
        }
    }

    /// Last generated insert id, when the driver reports one.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::NotConnected` while disconnected.
    pub fn last_insert_id(&mut self) -> Result<Option<u64>, AdapterError> {
        let caps = self.capabilities();
        let (conn, _cache, _pid) = self.parts_mut()?;
        if caps.insert_id {
            Ok(Some(conn.insert_id()))
        } else {
            Ok(None)
        }
    }

    /// Shared orchestration for the prepared paths: resolves the statement
    /// (cached or transient), runs `run` against it, and guarantees the
    /// release discipline on both exit paths.
    fn with_statement<T, F>(&mut self, sql: &str, uncached: bool, run: F) -> Result<T, AdapterError>
    where
        F: FnOnce(
            &mut ConnStmt<D>,
            &mut Option<Arc<Vec<String>>>,
        ) -> Result<T, DriverError>,
    {
        let (conn, cache, pid) = self.parts_mut()?;
        if uncached {
            let mut stmt = conn.prepare(sql).map_err(AdapterError::Execution)?;
            let mut columns = None;
            let outcome = run(&mut stmt, &mut columns);
            let _ = stmt.close();
            return outcome.map_err(AdapterError::Execution);
        }

        let entry = cache
            .get_or_prepare(pid, sql, || conn.prepare(sql))
            .map_err(AdapterError::Execution)?;
        match run(&mut entry.statement, &mut entry.columns) {
            Ok(value) => Ok(value),
            Err(err) => {
                // Some drivers leave a statement unusable after an error;
                // close it and drop the entry so the next execution
                // prepares anew.
                if let Some(entry) = cache.get_mut(pid, sql) {
                    let _ = entry.statement.close();
                }
                cache.delete(pid, sql);
                debug!(sql, %err, "closed and evicted statement after execution error");
                Err(AdapterError::Execution(err))
            }
        }
    }
}

/// Execute, cache column metadata on first success, fetch all rows and
/// release the result.
fn fetch_result<S: PreparedStatement>(
    stmt: &mut S,
    params: &[Value],
    columns: &mut Option<Arc<Vec<String>>>,
) -> Result<ResultSet, DriverError> {
    stmt.execute(params)?;
    if columns.is_none()
        && let Some(names) = stmt.result_metadata()?
    {
        *columns = Some(Arc::new(names));
    }
    let fetched = stmt.fetch_all();
    stmt.free_result();
    let rows = fetched?;
    let columns = columns.clone().unwrap_or_default();
    Ok(ResultSet::from_parts(columns, rows))
}

/// Outgoing bind coercion: booleans become driver integers; every other
/// value passes through unchanged.
fn coerce_binds(binds: &[Value]) -> Vec<Value> {
    binds
        .iter()
        .map(|value| match value {
            Value::Bool(flag) => Value::Int(i64::from(*flag)),
            other => other.clone(),
        })
        .collect()
}
