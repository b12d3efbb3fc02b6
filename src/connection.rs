//! Named connections.
//!
//! Entities refer to a database by name. This module keeps the process-wide
//! registry mapping those names to executors, and establishes `may_postgres`
//! connections from connection strings.
//!
//! The registry is read-mostly: it is written while the application starts
//! and read once per query facade construction.

use crate::error::LifeError;
use crate::executor::{LifeExecutor, MayPostgresExecutor};
use may_postgres::Client;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

static CONNECTIONS: Lazy<RwLock<HashMap<String, Arc<dyn LifeExecutor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register an executor under `name`, replacing any previous one
pub fn add_executor(name: impl Into<String>, executor: Arc<dyn LifeExecutor>) {
    let name = name.into();
    log::info!("registering connection `{}`", name);
    CONNECTIONS.write().insert(name, executor);
}

/// Connect to PostgreSQL and register the connection under `name`
///
/// # Errors
///
/// Returns `LifeError::Configuration` for a malformed connection string and
/// `LifeError::Persistence` if the server cannot be reached.
pub fn add_config(name: impl Into<String>, connection_string: &str) -> Result<(), LifeError> {
    let client = connect(connection_string)?;
    add_executor(name, Arc::new(MayPostgresExecutor::new(client)));
    Ok(())
}

/// Drop the connection registered under `name`, returning whether it existed
pub fn remove_config(name: &str) -> bool {
    CONNECTIONS.write().remove(name).is_some()
}

/// Whether a connection is registered under `name`
pub fn has_config(name: &str) -> bool {
    CONNECTIONS.read().contains_key(name)
}

/// Resolve the executor registered under `name`
///
/// # Errors
///
/// Returns `LifeError::Configuration` if nothing is registered under `name`.
pub fn start_query(name: &str) -> Result<Arc<dyn LifeExecutor>, LifeError> {
    CONNECTIONS
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| LifeError::Configuration(format!("database `{}` not found", name)))
}

/// Open a `may_postgres` client; blocks the calling coroutine, not the thread
pub fn connect(connection_string: &str) -> Result<Client, LifeError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("lifeline.connect").entered();

    let start = Instant::now();
    validate_connection_string(connection_string)?;
    let client = may_postgres::connect(connection_string)?;
    log::debug!("connected in {:?}", start.elapsed());
    Ok(client)
}

/// Reject connection strings `may_postgres` could never use
///
/// `postgres://` and `postgresql://` URIs must name a host; anything without
/// a scheme must be libpq `key=value` pairs.
pub fn validate_connection_string(connection_string: &str) -> Result<(), LifeError> {
    let dsn = connection_string.trim();
    let reason = match dsn.split_once("://") {
        _ if dsn.is_empty() => "empty",
        Some(("postgres" | "postgresql", rest)) => {
            let authority = rest.split(['/', '?']).next().unwrap_or_default();
            let host = authority.rsplit('@').next().unwrap_or_default();
            if host.is_empty() {
                "no host after the scheme"
            } else {
                return Ok(());
            }
        }
        Some(_) => "scheme is not postgres:// or postgresql://",
        None if dsn.contains('=') => return Ok(()),
        None => "neither a URI nor key=value pairs",
    };
    Err(LifeError::Configuration(format!(
        "invalid connection string `{}`: {}",
        dsn, reason
    )))
}
