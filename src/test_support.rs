//! Scriptable in-memory driver for exercising the adapter without a
//! server.
//!
//! The shared [`FakeState`] records every prepare, execute, close and
//! direct query, and can be told to fail connects, executions, probes or
//! BEGIN. Tests hold a clone of the state handle and inspect it after
//! driving the adapter.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::driver::{
    Capabilities, ConnectOptions, Connection, Driver, PreparedStatement, RawResult,
};
use crate::error::DriverError;
use crate::types::Value;

#[derive(Debug, Clone)]
struct Canned {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug)]
struct Inner {
    caps: Capabilities,
    fail_connect: bool,
    fail_close: bool,
    stat_ok: bool,
    last_error_code: Option<u32>,
    begin_error: Option<DriverError>,
    fail_execute: HashSet<String>,
    fail_query: HashSet<String>,
    canned: HashMap<String, Canned>,
    affected: HashMap<String, u64>,
    insert_id: u64,
    next_stmt_id: u64,
    connects: usize,
    connection_closes: usize,
    prepared: Vec<(u64, String)>,
    closes: Vec<(u64, String)>,
    metadata_fetches: HashMap<String, usize>,
    direct_queries: Vec<String>,
    raw_frees: usize,
    set_reconnect_calls: Vec<bool>,
    change_user_calls: Vec<String>,
    last_params: Vec<Value>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            caps: Capabilities {
                status_probe: true,
                change_user: true,
                reconnect_flag: true,
                insert_id: true,
                server_info: true,
            },
            fail_connect: false,
            fail_close: false,
            stat_ok: true,
            last_error_code: None,
            begin_error: None,
            fail_execute: HashSet::new(),
            fail_query: HashSet::new(),
            canned: HashMap::new(),
            affected: HashMap::new(),
            insert_id: 0,
            next_stmt_id: 0,
            connects: 0,
            connection_closes: 0,
            prepared: Vec::new(),
            closes: Vec::new(),
            metadata_fetches: HashMap::new(),
            direct_queries: Vec::new(),
            raw_frees: 0,
            set_reconnect_calls: Vec::new(),
            change_user_calls: Vec::new(),
            last_params: Vec::new(),
        }
    }
}

/// Shared, lockable state behind every fake connection and statement.
#[derive(Debug, Default)]
pub struct FakeState {
    inner: Mutex<Inner>,
}

impl FakeState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -- scripting ---------------------------------------------------

    pub fn set_capabilities(&self, caps: Capabilities) {
        self.lock().caps = caps;
    }

    pub fn fail_next_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn fail_connection_close(&self, fail: bool) {
        self.lock().fail_close = fail;
    }

    pub fn set_stat_ok(&self, ok: bool) {
        self.lock().stat_ok = ok;
    }

    pub fn set_last_error_code(&self, code: Option<u32>) {
        self.lock().last_error_code = code;
    }

    /// Make every execution of `sql` fail until cleared.
    pub fn fail_execute_of(&self, sql: &str) {
        self.lock().fail_execute.insert(sql.to_string());
    }

    pub fn clear_execute_failure(&self, sql: &str) {
        self.lock().fail_execute.remove(sql);
    }

    pub fn fail_query_of(&self, sql: &str) {
        self.lock().fail_query.insert(sql.to_string());
    }

    /// Make BEGIN fail with the given errno.
    pub fn reject_begin(&self, code: u32) {
        self.lock().begin_error = Some(DriverError::new(code, "BEGIN rejected"));
    }

    /// Canned result for `sql`, served by both execution paths.
    pub fn put_rows(&self, sql: &str, columns: &[&str], rows: Vec<Vec<Value>>) {
        self.lock().canned.insert(
            sql.to_string(),
            Canned {
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
                rows,
            },
        );
    }

    pub fn set_affected(&self, sql: &str, count: u64) {
        self.lock().affected.insert(sql.to_string(), count);
    }

    pub fn set_insert_id(&self, id: u64) {
        self.lock().insert_id = id;
    }

    // -- inspection --------------------------------------------------

    #[must_use]
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    #[must_use]
    pub fn connection_closes(&self) -> usize {
        self.lock().connection_closes
    }

    /// How many times `sql` was prepared.
    #[must_use]
    pub fn prepare_count(&self, sql: &str) -> usize {
        self.lock().prepared.iter().filter(|(_, s)| s == sql).count()
    }

    /// How many close calls hit statements prepared from `sql`.
    #[must_use]
    pub fn close_count(&self, sql: &str) -> usize {
        self.lock().closes.iter().filter(|(_, s)| s == sql).count()
    }

    /// Whether any single statement handle was closed more than once.
    #[must_use]
    pub fn has_double_close(&self) -> bool {
        let guard = self.lock();
        let mut seen = HashSet::new();
        guard.closes.iter().any(|(id, _)| !seen.insert(*id))
    }

    #[must_use]
    pub fn metadata_fetches(&self, sql: &str) -> usize {
        self.lock().metadata_fetches.get(sql).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn direct_queries(&self) -> Vec<String> {
        self.lock().direct_queries.clone()
    }

    #[must_use]
    pub fn raw_frees(&self) -> usize {
        self.lock().raw_frees
    }

    #[must_use]
    pub fn set_reconnect_calls(&self) -> Vec<bool> {
        self.lock().set_reconnect_calls.clone()
    }

    #[must_use]
    pub fn change_user_calls(&self) -> Vec<String> {
        self.lock().change_user_calls.clone()
    }

    /// Parameter values received by the most recent execution.
    #[must_use]
    pub fn last_params(&self) -> Vec<Value> {
        self.lock().last_params.clone()
    }
}

/// Driver whose connections and statements run entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    pub state: Arc<FakeState>,
}

impl FakeDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for FakeDriver {
    type Conn = FakeConnection;

    fn connect(&self, _options: &ConnectOptions) -> Result<Self::Conn, DriverError> {
        let mut guard = self.state.lock();
        if guard.fail_connect {
            return Err(DriverError::new(2002, "can't connect to server"));
        }
        guard.connects += 1;
        Ok(FakeConnection {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    state: Arc<FakeState>,
}

impl Connection for FakeConnection {
    type Stmt = FakeStatement;
    type Raw = FakeRawResult;

    fn capabilities(&self) -> Capabilities {
        self.state.lock().caps
    }

    fn set_reconnect(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.state.lock().set_reconnect_calls.push(enabled);
        Ok(())
    }

    fn change_user(
        &mut self,
        username: &str,
        _password: &str,
        _database: &str,
    ) -> Result<(), DriverError> {
        self.state.lock().change_user_calls.push(username.to_string());
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> Result<Self::Stmt, DriverError> {
        let mut guard = self.state.lock();
        guard.next_stmt_id += 1;
        let id = guard.next_stmt_id;
        guard.prepared.push((id, sql.to_string()));
        Ok(FakeStatement {
            id,
            sql: sql.to_string(),
            state: Arc::clone(&self.state),
            affected: 0,
            has_result: false,
        })
    }

    fn query(&mut self, sql: &str) -> Result<Option<Self::Raw>, DriverError> {
        let mut guard = self.state.lock();
        guard.direct_queries.push(sql.to_string());
        if sql == "BEGIN"
            && let Some(err) = guard.begin_error.clone()
        {
            return Err(err);
        }
        if guard.fail_query.contains(sql) {
            return Err(DriverError::new(2006, "server has gone away"));
        }
        match guard.canned.get(sql) {
            Some(canned) => Ok(Some(FakeRawResult {
                columns: canned.columns.clone(),
                rows: canned.rows.clone(),
                state: Arc::clone(&self.state),
            })),
            None => Ok(None),
        }
    }

    fn stat(&mut self) -> Result<String, DriverError> {
        if self.state.lock().stat_ok {
            Ok("Uptime: 42".to_string())
        } else {
            Err(DriverError::new(2006, "server has gone away"))
        }
    }

    fn last_error_code(&self) -> Option<u32> {
        self.state.lock().last_error_code
    }

    fn insert_id(&mut self) -> u64 {
        self.state.lock().insert_id
    }

    fn server_info(&self) -> Option<String> {
        Some("8.0.0-fake".to_string())
    }

    fn close(self) -> Result<(), DriverError> {
        let mut guard = self.state.lock();
        guard.connection_closes += 1;
        if guard.fail_close {
            return Err(DriverError::new(2013, "lost connection during close"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeStatement {
    id: u64,
    sql: String,
    state: Arc<FakeState>,
    affected: u64,
    has_result: bool,
}

impl PreparedStatement for FakeStatement {
    fn execute(&mut self, params: &[Value]) -> Result<(), DriverError> {
        let mut guard = self.state.lock();
        guard.last_params = params.to_vec();
        if guard.fail_execute.contains(&self.sql) {
            return Err(DriverError::new(1064, "syntax error"));
        }
        self.affected = guard.affected.get(&self.sql).copied().unwrap_or(0);
        self.has_result = guard.canned.contains_key(&self.sql);
        Ok(())
    }

    fn result_metadata(&mut self) -> Result<Option<Vec<String>>, DriverError> {
        let mut guard = self.state.lock();
        *guard.metadata_fetches.entry(self.sql.clone()).or_insert(0) += 1;
        Ok(guard.canned.get(&self.sql).map(|c| c.columns.clone()))
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, DriverError> {
        if !self.has_result {
            return Ok(Vec::new());
        }
        let guard = self.state.lock();
        Ok(guard
            .canned
            .get(&self.sql)
            .map(|c| c.rows.clone())
            .unwrap_or_default())
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn free_result(&mut self) {
        self.has_result = false;
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let mut guard = self.state.lock();
        guard.closes.push((self.id, self.sql.clone()));
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeRawResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    state: Arc<FakeState>,
}

impl RawResult for FakeRawResult {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, DriverError> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn free(self) {
        self.state.lock().raw_frees += 1;
    }
}
