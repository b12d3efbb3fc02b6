//! Scripted executor for tests.
//!
//! `MockExecutor` records every statement it receives and answers from
//! queues: row sets for queries, [`ExecResult`]s for writes. An empty query
//! queue answers with no rows; an empty write queue answers with one affected
//! row and no insert id.
//!
//! ```no_run
//! # use lifeline::mock::MockExecutor;
//! # use lifeline::{row, Entity, LifeError, Value};
//! # fn book() -> Entity {
//! #     Entity::builder("", "books", "id").fields(["id", "title"]).build().unwrap()
//! # }
//! # fn main() -> Result<(), LifeError> {
//! let mock = MockExecutor::register("test_books");
//! mock.append_query_result(vec![row([("id", Value::from(1)), ("title", Value::from("Dune"))])]);
//! let books = book().with_config("test_books").all()?.fetch_models()?;
//! assert_eq!(mock.query_count(), 1);
//! # assert_eq!(books.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::connection;
use crate::error::LifeError;
use crate::executor::{ExecResult, LifeExecutor};
use crate::value::{Row, Value};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A statement seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct MockExecutor {
    query_results: Mutex<VecDeque<Result<Vec<Row>, String>>>,
    exec_results: Mutex<VecDeque<Result<ExecResult, String>>>,
    log: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock and register it as the connection `name`
    pub fn register(name: &str) -> Arc<MockExecutor> {
        let mock = Arc::new(MockExecutor::new());
        connection::add_executor(name, mock.clone());
        mock
    }

    pub fn append_query_result(&self, rows: Vec<Row>) -> &Self {
        self.query_results.lock().push_back(Ok(rows));
        self
    }

    /// The next query fails with `LifeError::Persistence(message)`
    pub fn append_query_error(&self, message: &str) -> &Self {
        self.query_results.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn append_exec_result(&self, result: ExecResult) -> &Self {
        self.exec_results.lock().push_back(Ok(result));
        self
    }

    /// The next write fails with `LifeError::Persistence(message)`
    pub fn append_exec_error(&self, message: &str) -> &Self {
        self.exec_results.lock().push_back(Err(message.to_string()));
        self
    }

    /// Every statement received so far, in order
    pub fn statements(&self) -> Vec<Statement> {
        self.log.lock().clone()
    }

    /// Number of SELECT statements received
    pub fn query_count(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|s| s.sql.starts_with("SELECT"))
            .count()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.log.lock().push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    fn next_exec(&self) -> Result<ExecResult, LifeError> {
        match self.exec_results.lock().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(LifeError::Persistence(message)),
            None => Ok(ExecResult::new(1)),
        }
    }
}

impl LifeExecutor for MockExecutor {
    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, LifeError> {
        self.record(sql, params);
        match self.query_results.lock().pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(LifeError::Persistence(message)),
            None => Ok(Vec::new()),
        }
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, LifeError> {
        self.record(sql, params);
        self.next_exec().map(|r| r.rows_affected)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<ExecResult, LifeError> {
        self.record(sql, params);
        self.next_exec()
    }

    fn begin(&self) -> Result<(), LifeError> {
        self.record("BEGIN", &[]);
        Ok(())
    }

    fn commit(&self) -> Result<(), LifeError> {
        self.record("COMMIT", &[]);
        Ok(())
    }

    fn rollback(&self) -> Result<(), LifeError> {
        self.record("ROLLBACK", &[]);
        Ok(())
    }
}
