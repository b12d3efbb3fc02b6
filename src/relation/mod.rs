//! Relation module for entity relationships.
//!
//! - [`BelongsTo`]: the owner row holds the foreign key (many-to-one)
//! - [`HasOne`]: the target row holds the foreign key, at most one match
//! - [`HasMany`]: the target rows hold the foreign key (one-to-many)
//! - [`BelongsToMany`]: through a link table (many-to-many)
//!
//! # Query shape
//!
//! Every relation query selects from the owner table aliased as
//! `__primary__`, selects the owner's primary key as
//! `__table_<ownerTable>__key`, and joins its way to the target table. The
//! synthetic key column lets one batched query be split back per owner even
//! when owner and target share column names:
//!
//! ```text
//! SELECT "__primary__"."id" AS "__table_books__key", "authors"."id", "authors"."name"
//! FROM "books" AS "__primary__"
//! INNER JOIN "authors" ON "__primary__"."author_id" = "authors"."id"
//! WHERE "__primary__"."id" IN ($1, $2)
//! ```

mod belongs_to;
mod belongs_to_many;
mod eager;
mod has_many;
mod has_one;

pub use belongs_to::BelongsTo;
pub use belongs_to_many::BelongsToMany;
pub use eager::{eager_load, EagerLoad, QueryCustomizer};
pub use has_many::HasMany;
pub use has_one::HasOne;

use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::LifeError;
use crate::query::{Comparator, ModelQuery};
use crate::record::Record;
use crate::value::{Row, Value};
use indexmap::IndexMap;

/// Alias given to the owner table in every relation query
pub const PRIMARY_ALIAS: &str = "__primary__";

/// Name of the synthetic owner-key column for `owner_table`
pub fn owner_key_column(owner_table: &str) -> String {
    format!("__table_{}__key", owner_table)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
}

/// State shared by every relation variant
#[derive(Debug, Clone)]
pub struct RelationCore {
    owner: Record,
    target: Entity,
    query: ModelQuery,
    owner_pk: String,
    owner_key: String,
    link_columns: Vec<String>,
}

impl RelationCore {
    /// Base query: owner table as `__primary__`, owner key column, target columns
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Configuration` if the owner's connection is not registered.
    pub(crate) fn new(owner: &Record, target: Entity) -> Result<Self, LifeError> {
        let owner_table = owner.table();
        let owner_pk = owner.primary_key();
        let owner_key = owner_key_column(&owner_table);

        let mut query = ModelQuery::new(&owner.config())?;
        query
            .table(&format!("{} {}", owner_table, PRIMARY_ALIAS))
            .add_col(format!("{}.{} {}", PRIMARY_ALIAS, owner_pk, owner_key));
        for column in target.select_columns() {
            query.add_col(column);
        }
        query.to_model(&target);

        Ok(Self {
            owner: owner.clone(),
            target,
            query,
            owner_pk,
            owner_key,
            link_columns: Vec::new(),
        })
    }

    pub fn owner(&self) -> &Record {
        &self.owner
    }

    pub fn target(&self) -> &Entity {
        &self.target
    }

    pub fn query(&self) -> &ModelQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut ModelQuery {
        &mut self.query
    }

    /// The synthetic column carrying the owner id in result rows
    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    pub(crate) fn owner_column(&self) -> String {
        format!("{}.{}", PRIMARY_ALIAS, self.owner_pk)
    }

    pub(crate) fn link_columns(&self) -> &[String] {
        &self.link_columns
    }

    pub(crate) fn set_link_columns(&mut self, columns: Vec<String>) {
        self.link_columns = columns;
    }

    /// Base query restricted to the current owner
    fn owner_query(&self) -> ModelQuery {
        let mut query = self.query.clone();
        query.filter(&self.owner_column(), Comparator::Eq, self.owner.id());
        query
    }

    fn hydrate(&self, row: &Row) -> Result<Record, LifeError> {
        let record = self.query.hydrate(row)?;
        for column in &self.link_columns {
            if let Some(value) = row.get(column) {
                record.set_additional_column(column, value.clone());
            }
        }
        if !self.link_columns.is_empty() {
            record.set_visible_columns(row.keys());
        }
        Ok(record)
    }

    fn fetch(&self, query: &ModelQuery) -> Result<Collection, LifeError> {
        let rows = query.fetch()?;
        let mut collection = Collection::new();
        for row in &rows {
            collection.add(self.hydrate(row)?);
        }
        Ok(collection)
    }

    fn fetch_grouped(&self, ids: &[Value]) -> Result<IndexMap<Value, Collection>, LifeError> {
        let mut query = self.query.clone();
        query.where_in(&self.owner_column(), ids.iter().cloned());
        let rows = query.fetch()?;

        let mut groups: IndexMap<Value, Collection> = IndexMap::new();
        for row in &rows {
            let Some(owner_id) = row.get(&self.owner_key) else {
                log::trace!("row without `{}` skipped", self.owner_key);
                continue;
            };
            let record = self.hydrate(row)?;
            groups.entry(owner_id.clone()).or_default().add(record);
        }
        log::trace!(
            "grouped {} row(s) into {} owner(s) for `{}`",
            rows.len(),
            groups.len(),
            self.target.table()
        );
        Ok(groups)
    }
}

/// Shared contract of the four relation variants
pub trait Relation: Send {
    fn core(&self) -> &RelationCore;

    fn core_mut(&mut self) -> &mut RelationCore;

    fn kind(&self) -> RelationKind;

    /// Whether results are collections (`HasMany`, `BelongsToMany`) or single records
    fn returns_many(&self) -> bool {
        matches!(self.kind(), RelationKind::HasMany | RelationKind::BelongsToMany)
    }

    /// The relation's base query, for customization
    fn query_mut(&mut self) -> &mut ModelQuery {
        self.core_mut().query_mut()
    }

    /// The underlying join query, optionally restricted to the current owner
    fn get_query(&mut self, apply_owner_filter: bool) -> &mut ModelQuery {
        let core = self.core_mut();
        if apply_owner_filter {
            let column = core.owner_column();
            let id = core.owner.id();
            core.query.filter(&column, Comparator::Eq, id);
        }
        &mut core.query
    }

    /// First related record of the current owner
    fn get_result(&self) -> Result<Option<Record>, LifeError> {
        Ok(self.get_results()?.first().cloned())
    }

    /// All related records of the current owner
    fn get_results(&self) -> Result<Collection, LifeError> {
        let core = self.core();
        core.fetch(&core.owner_query())
    }

    /// One batched query for `ids`, grouped by owner id
    ///
    /// Rows for the same owner keep their database order. Owners with no
    /// matching rows have no entry.
    fn get_results_grouped(&self, ids: &[Value]) -> Result<IndexMap<Value, Collection>, LifeError> {
        self.core().fetch_grouped(ids)
    }

    /// One batched query for `ids`, keeping the first related record per owner
    fn get_result_grouped(&self, ids: &[Value]) -> Result<IndexMap<Value, Record>, LifeError> {
        Ok(self
            .get_results_grouped(ids)?
            .into_iter()
            .filter_map(|(id, group)| group.first().cloned().map(|record| (id, record)))
            .collect())
    }
}
