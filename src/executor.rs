//! `LifeExecutor` - the query engine seam.
//!
//! Everything above this module builds SQL text plus positional [`Value`]
//! parameters; an executor runs them. [`MayPostgresExecutor`] talks to
//! PostgreSQL through `may_postgres`, `crate::mock::MockExecutor` replays
//! scripted results in tests.

use crate::error::LifeError;
use crate::value::postgres::{bind_params, decode_row};
use crate::value::{Row, Value};
use may_postgres::types::ToSql;
use may_postgres::Client;
use std::time::Instant;

/// Outcome of a write statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows the statement touched
    pub rows_affected: u64,
    /// Generated key reported for an insert, if any
    pub insert_id: Option<i64>,
}

impl ExecResult {
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            insert_id: None,
        }
    }

    pub fn with_insert_id(mut self, id: i64) -> Self {
        self.insert_id = Some(id);
        self
    }
}

/// Trait for executing database operations
///
/// Implementations must be shareable across coroutines: the connection
/// registry hands out one `Arc<dyn LifeExecutor>` per named connection.
pub trait LifeExecutor: Send + Sync {
    /// Run a statement that returns rows
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Persistence` if the engine rejects the statement.
    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, LifeError>;

    /// Run a statement and return the affected row count
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Persistence` if the engine rejects the statement.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, LifeError>;

    /// Run an insert; `sql` ends in `RETURNING <key>` when a generated key is wanted
    fn insert(&self, sql: &str, params: &[Value]) -> Result<ExecResult, LifeError> {
        self.execute(sql, params).map(ExecResult::new)
    }

    fn begin(&self) -> Result<(), LifeError> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    fn commit(&self) -> Result<(), LifeError> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    fn rollback(&self) -> Result<(), LifeError> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }
}

/// Executor backed by a single `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Check connection health by running `SELECT 1`
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Persistence` if the connection is unusable.
    pub fn check_health(&self) -> Result<bool, LifeError> {
        let rows = self.client.query("SELECT 1", &[])?;
        Ok(!rows.is_empty())
    }

    fn run<T>(
        &self,
        sql: &str,
        params: &[Value],
        f: impl FnOnce(&Client, &may_postgres::Statement, &[&dyn ToSql]) -> Result<T, LifeError>,
    ) -> Result<T, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("lifeline.execute", sql = %sql).entered();

        let start = Instant::now();
        let statement = self.client.prepare(sql)?;
        let bound = bind_params(params, statement.params())?;
        let refs: Vec<&dyn ToSql> = bound.iter().map(|p| &**p as &dyn ToSql).collect();
        let result = f(&self.client, &statement, &refs);
        log::debug!("{} ({:?})", sql, start.elapsed());
        result
    }
}

impl LifeExecutor for MayPostgresExecutor {
    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, LifeError> {
        self.run(sql, params, |client, statement, refs| {
            let rows = client.query(statement, refs)?;
            rows.iter().map(decode_row).collect()
        })
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, LifeError> {
        self.run(sql, params, |client, statement, refs| {
            Ok(client.execute(statement, refs)?)
        })
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<ExecResult, LifeError> {
        if !sql.contains(" RETURNING ") {
            return self.execute(sql, params).map(ExecResult::new);
        }
        let rows = self.query_all(sql, params)?;
        let insert_id = rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_i64);
        Ok(ExecResult {
            rows_affected: rows.len() as u64,
            insert_id,
        })
    }
}
