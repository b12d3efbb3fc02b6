//! Many-to-one: the owner row carries the foreign key.

use super::{Relation, RelationCore, RelationKind, PRIMARY_ALIAS};
use crate::entity::Entity;
use crate::error::LifeError;
use crate::record::Record;

/// `owner.<foreign_key>` references `target.<pk>`
#[derive(Debug, Clone)]
pub struct BelongsTo {
    core: RelationCore,
    foreign_key: String,
}

impl BelongsTo {
    /// # Errors
    ///
    /// Returns `LifeError::Configuration` if the owner's connection is not registered.
    pub fn new(owner: &Record, target: Entity, foreign_key: &str) -> Result<Self, LifeError> {
        let mut core = RelationCore::new(owner, target)?;
        let target_table = core.target().table().to_string();
        let target_pk = core.target().primary_key().to_string();
        core.query_mut().join_on(
            &target_table,
            &format!("{}.{}", PRIMARY_ALIAS, foreign_key),
            &format!("{}.{}", target_table, target_pk),
        );
        Ok(Self {
            core,
            foreign_key: foreign_key.to_string(),
        })
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }
}

impl Relation for BelongsTo {
    fn core(&self) -> &RelationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RelationCore {
        &mut self.core
    }

    fn kind(&self) -> RelationKind {
        RelationKind::BelongsTo
    }
}
