//! # Lifeline
//!
//! ActiveRecord-style models over PostgreSQL on the `may` coroutine runtime.
//!
//! Entities declare their table, fields and relations; records are shared
//! handles to rows; relations resolve through one batched query per path
//! segment when eager loaded:
//!
//! ```no_run
//! # use lifeline::{EagerLoad, Entity, LifeError};
//! # fn country() -> Entity {
//! #     Entity::builder("main", "countries", "id").fields(["id", "name"]).build().unwrap()
//! # }
//! # fn author() -> Entity {
//! #     Entity::builder("main", "authors", "id")
//! #         .fields(["id", "name", "country_id"])
//! #         .belongs_to("country", country, "country_id")
//! #         .build()
//! #         .unwrap()
//! # }
//! # fn book() -> Entity {
//! #     Entity::builder("main", "books", "id")
//! #         .fields(["id", "title", "author_id"])
//! #         .belongs_to("author", author, "author_id")
//! #         .build()
//! #         .unwrap()
//! # }
//! # fn main() -> Result<(), LifeError> {
//! let books = book().all()?.fetch_models()?;
//! books.eager_load(&EagerLoad::new().path("author.country"))?;
//! for book in &books {
//!     println!("{}", book.to_json());
//! }
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod executor;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod query;
pub mod record;
pub mod relation;
pub mod value;

pub use collection::Collection;
pub use crate::config::DatabaseConfig;
pub use entity::{ColumnType, Entity, EntityBuilder};
pub use error::{LifeError, LifeResult};
pub use executor::{ExecResult, LifeExecutor, MayPostgresExecutor};
pub use query::{Comparator, ModelQuery, Order, Page};
pub use record::{Record, RelationValue};
pub use relation::{BelongsTo, BelongsToMany, EagerLoad, HasMany, HasOne, Relation};
pub use value::{row, Row, Value};
