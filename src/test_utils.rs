//! Scripted in-memory driver for exercising the adapter without a database.
//!
//! [`FakeDriver::new`] returns the driver together with a [`FakeHandle`] that
//! stays with the test: it records every call the adapter makes and lets the
//! test script failures, health and canned results.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::driver::{BoxedResult, BufferedResult, Driver};
use crate::error::DriverError;
use crate::pool::DriverManager;
use crate::types::RowValues;

/// One call observed by a [`FakeDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Execute(String),
    ExecuteWithArgs(String, Vec<RowValues>),
    Prepare(String, String),
    Deallocate(String),
    ExecuteNamed(String, Vec<RowValues>),
    Free,
    Probe,
    Reset,
}

#[derive(Debug)]
struct FakeState {
    calls: Vec<DriverCall>,
    healthy: bool,
    reset_heals: bool,
    failures: VecDeque<DriverError>,
    prepare_failures: VecDeque<DriverError>,
    deallocate_failures: VecDeque<DriverError>,
    responses: HashMap<String, BufferedResult>,
    server_statements: HashMap<String, String>,
    sessions: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            healthy: true,
            reset_heals: true,
            failures: VecDeque::new(),
            prepare_failures: VecDeque::new(),
            deallocate_failures: VecDeque::new(),
            responses: HashMap::new(),
            server_statements: HashMap::new(),
            sessions: 0,
        }
    }
}

/// Test-side view of a [`FakeDriver`]; clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeHandle(Arc<Mutex<FakeState>>);

impl FakeHandle {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The next statement execution (plain, positional or named) fails with `err`.
    pub fn fail_next(&self, err: DriverError) {
        self.lock().failures.push_back(err);
    }

    pub fn fail_next_prepare(&self, err: DriverError) {
        self.lock().prepare_failures.push_back(err);
    }

    pub fn fail_next_deallocate(&self, err: DriverError) {
        self.lock().deallocate_failures.push_back(err);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    /// Whether `reset_session` makes the driver healthy again (default true).
    pub fn set_reset_heals(&self, heals: bool) {
        self.lock().reset_heals = heals;
    }

    /// Canned result for a SQL text (for named executions, the prepared SQL).
    pub fn respond(&self, sql: &str, result: BufferedResult) {
        self.lock().responses.insert(sql.to_string(), result);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| pred(call)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Statements the fake "server" currently holds.
    #[must_use]
    pub fn server_statement(&self, name: &str) -> Option<String> {
        self.lock().server_statements.get(name).cloned()
    }

    /// Number of drivers created through [`FakeHandle::manager`].
    #[must_use]
    pub fn sessions(&self) -> usize {
        self.lock().sessions
    }

    /// Pool manager whose connections all report to this handle.
    #[must_use]
    pub fn manager(&self) -> DriverManager {
        let handle = self.clone();
        DriverManager::new("fake", move || {
            {
                let mut state = handle.lock();
                state.sessions += 1;
                state.server_statements.clear();
            }
            Ok(Box::new(FakeDriver {
                state: handle.clone(),
            }))
        })
    }
}

#[derive(Debug)]
pub struct FakeDriver {
    state: FakeHandle,
}

impl FakeDriver {
    #[must_use]
    pub fn new() -> (Self, FakeHandle) {
        let handle = FakeHandle::default();
        (
            Self {
                state: handle.clone(),
            },
            handle,
        )
    }

    fn run(&mut self, call: DriverCall, sql: Option<String>) -> Result<BoxedResult, DriverError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        let result = sql
            .and_then(|sql| state.responses.get(&sql).cloned())
            .unwrap_or_else(|| BufferedResult::affected(1));
        Ok(Box::new(result))
    }
}

impl Driver for FakeDriver {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    fn execute_statement(&mut self, sql: &str) -> Result<BoxedResult, DriverError> {
        self.run(DriverCall::Execute(sql.to_string()), Some(sql.to_string()))
    }

    fn execute_with_args(
        &mut self,
        sql: &str,
        args: &[RowValues],
    ) -> Result<BoxedResult, DriverError> {
        self.run(
            DriverCall::ExecuteWithArgs(sql.to_string(), args.to_vec()),
            Some(sql.to_string()),
        )
    }

    fn prepare_named(&mut self, name: &str, sql: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(DriverCall::Prepare(name.to_string(), sql.to_string()));
        if let Some(err) = state.prepare_failures.pop_front() {
            return Err(err);
        }
        if state.server_statements.contains_key(name) {
            return Err(DriverError::new(format!(
                "prepared statement \"{name}\" already exists"
            ))
            .with_code("42P05"));
        }
        state
            .server_statements
            .insert(name.to_string(), sql.to_string());
        Ok(())
    }

    fn deallocate_named(&mut self, name: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Deallocate(name.to_string()));
        if let Some(err) = state.deallocate_failures.pop_front() {
            return Err(err);
        }
        match state.server_statements.remove(name) {
            Some(_) => Ok(()),
            None => Err(DriverError::new(format!(
                "prepared statement \"{name}\" does not exist"
            ))
            .with_code("26000")),
        }
    }

    fn execute_named(
        &mut self,
        name: &str,
        args: &[RowValues],
    ) -> Result<BoxedResult, DriverError> {
        let sql = self.state.lock().server_statements.get(name).cloned();
        if sql.is_none() {
            let mut state = self.state.lock();
            state
                .calls
                .push(DriverCall::ExecuteNamed(name.to_string(), args.to_vec()));
            return Err(DriverError::new(format!(
                "prepared statement \"{name}\" does not exist"
            ))
            .with_code("26000"));
        }
        self.run(DriverCall::ExecuteNamed(name.to_string(), args.to_vec()), sql)
    }

    fn free_result(&mut self, result: BoxedResult) {
        self.state.lock().calls.push(DriverCall::Free);
        drop(result);
    }

    fn is_healthy(&mut self) -> bool {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Probe);
        state.healthy
    }

    fn reset_session(&mut self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Reset);
        state.server_statements.clear();
        if state.reset_heals {
            state.healthy = true;
        }
        Ok(())
    }

    fn insert_id_sql(&self) -> &str {
        "SELECT lastval()"
    }
}
