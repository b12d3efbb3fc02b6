//! Error types for lifeline.
//!
//! Every fallible operation returns [`LifeError`]. Reads that find nothing are
//! not errors: they surface as `Option::None` or [`crate::RelationValue::Null`].

use thiserror::Error;

/// The crate-wide error type
#[derive(Debug, Error)]
pub enum LifeError {
    /// A named connection could not be resolved, or configuration failed to load
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation is not valid for the record's current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An eager-load path or relation lookup named a relation the entity does not declare
    #[error("relation `{relation}` is not declared on table `{table}`")]
    InvalidRelation { relation: String, table: String },

    /// The query engine failed while executing a statement
    #[error("persistence error: {0}")]
    Persistence(String),

    /// An entity definition violates a structural constraint
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A statement could not be built
    #[error("query error: {0}")]
    Query(String),

    /// A result value could not be decoded
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<may_postgres::Error> for LifeError {
    fn from(err: may_postgres::Error) -> Self {
        LifeError::Persistence(err.to_string())
    }
}

impl From<config::ConfigError> for LifeError {
    fn from(err: config::ConfigError) -> Self {
        LifeError::Configuration(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type LifeResult<T> = Result<T, LifeError>;
