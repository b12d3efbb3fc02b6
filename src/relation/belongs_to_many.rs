//! Many-to-many through a link table.
//!
//! Reads join `__primary__ -> link -> target`. Writes (`link`, `unlink`,
//! `update`) go straight to the link table and never touch the target.

use super::{Relation, RelationCore, RelationKind};
use crate::entity::Entity;
use crate::error::LifeError;
use crate::query::{Comparator, ModelQuery};
use crate::record::Record;
use crate::value::{Row, Value};

/// `link.<primary_foreign_key>` references the owner, `link.<secondary_foreign_key>` the target
#[derive(Debug, Clone)]
pub struct BelongsToMany {
    core: RelationCore,
    link_table: String,
    primary_foreign_key: String,
    secondary_foreign_key: String,
}

impl BelongsToMany {
    pub fn new(
        owner: &Record,
        target: Entity,
        link_table: &str,
        primary_foreign_key: &str,
        secondary_foreign_key: &str,
    ) -> Result<Self, LifeError> {
        let mut core = RelationCore::new(owner, target)?;
        let owner_column = core.owner_column();
        let target_table = core.target().table().to_string();
        let target_pk = core.target().primary_key().to_string();
        core.query_mut()
            .join_on(
                link_table,
                &owner_column,
                &format!("{}.{}", link_table, primary_foreign_key),
            )
            .join_on(
                &target_table,
                &format!("{}.{}", link_table, secondary_foreign_key),
                &format!("{}.{}", target_table, target_pk),
            );
        Ok(Self {
            core,
            link_table: link_table.to_string(),
            primary_foreign_key: primary_foreign_key.to_string(),
            secondary_foreign_key: secondary_foreign_key.to_string(),
        })
    }

    pub fn link_table(&self) -> &str {
        &self.link_table
    }

    /// Pivot columns selected from the link table and attached to each related record
    pub fn set_link_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> &mut Self {
        let names: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        for name in &names {
            let column = format!("{}.{}", self.link_table, name);
            self.core.query_mut().add_col(column);
        }
        self.core.set_link_columns(names);
        self
    }

    pub fn link_columns(&self) -> &[String] {
        self.core.link_columns()
    }

    /// Insert a link row between the owner and `id`
    pub fn link(&self, id: impl Into<Value>) -> Result<bool, LifeError> {
        let mut row = Row::new();
        row.insert(self.primary_foreign_key.clone(), self.core.owner().id());
        row.insert(self.secondary_foreign_key.clone(), id.into());
        let result = self.link_query()?.insert(&row)?;
        log::debug!(
            "linked `{}` row into `{}`: {} row(s)",
            self.core.owner().table(),
            self.link_table,
            result.rows_affected
        );
        Ok(result.rows_affected > 0)
    }

    /// Delete the link row between the owner and `id`
    pub fn unlink(&self, id: impl Into<Value>) -> Result<bool, LifeError> {
        let result = self.pair_query(id.into())?.delete()?;
        Ok(result.rows_affected > 0)
    }

    /// Update pivot values on the link row between the owner and `id`
    ///
    /// Only configured link columns are written; anything else in `values`
    /// is dropped. Nothing to write returns `Ok(false)` without a statement.
    pub fn update(&self, id: impl Into<Value>, values: &Row) -> Result<bool, LifeError> {
        let payload: Row = values
            .iter()
            .filter(|(name, _)| self.core.link_columns().iter().any(|c| c == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if payload.is_empty() {
            log::debug!("no link columns to update on `{}`", self.link_table);
            return Ok(false);
        }
        let result = self.pair_query(id.into())?.update(&payload)?;
        Ok(result.rows_affected > 0)
    }

    fn link_query(&self) -> Result<ModelQuery, LifeError> {
        let mut query = ModelQuery::new(&self.core.owner().config())?;
        query.table(&self.link_table);
        Ok(query)
    }

    fn pair_query(&self, id: Value) -> Result<ModelQuery, LifeError> {
        let mut query = self.link_query()?;
        query
            .filter(&self.primary_foreign_key, Comparator::Eq, self.core.owner().id())
            .filter(&self.secondary_foreign_key, Comparator::Eq, id);
        Ok(query)
    }
}

impl Relation for BelongsToMany {
    fn core(&self) -> &RelationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RelationCore {
        &mut self.core
    }

    fn kind(&self) -> RelationKind {
        RelationKind::BelongsToMany
    }
}
