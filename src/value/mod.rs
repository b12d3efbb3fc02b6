//! Value type system for lifeline
//!
//! - **`Value`** - tagged column value shared by records, rows and parameters
//! - **`Row`** - ordered open map of column name to value
//! - **`sql`** - conversion to and from `sea_query::Value`
//! - **`postgres`** - parameter binding and row decoding for `may_postgres`

pub mod postgres;
pub mod sql;
pub mod types;

pub use types::{row, Row, Value};
