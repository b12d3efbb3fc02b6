//! One-to-one: the target row carries the foreign key.

use super::{Relation, RelationCore, RelationKind, PRIMARY_ALIAS};
use crate::entity::Entity;
use crate::error::LifeError;
use crate::record::Record;

/// `target.<foreign_key>` references `owner.<pk>`; the first match wins
#[derive(Debug, Clone)]
pub struct HasOne {
    core: RelationCore,
    foreign_key: String,
}

impl HasOne {
    pub fn new(owner: &Record, target: Entity, foreign_key: &str) -> Result<Self, LifeError> {
        let mut core = RelationCore::new(owner, target)?;
        join_target(&mut core, foreign_key);
        Ok(Self {
            core,
            foreign_key: foreign_key.to_string(),
        })
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }
}

/// `__primary__.<pk> = target.<foreign_key>`
pub(super) fn join_target(core: &mut RelationCore, foreign_key: &str) {
    let target_table = core.target().table().to_string();
    let owner_column = format!("{}.{}", PRIMARY_ALIAS, core.owner().primary_key());
    core.query_mut().join_on(
        &target_table,
        &owner_column,
        &format!("{}.{}", target_table, foreign_key),
    );
}

impl Relation for HasOne {
    fn core(&self) -> &RelationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RelationCore {
        &mut self.core
    }

    fn kind(&self) -> RelationKind {
        RelationKind::HasOne
    }
}
