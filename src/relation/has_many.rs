//! One-to-many: each target row carries the foreign key.

use super::has_one::join_target;
use super::{Relation, RelationCore, RelationKind};
use crate::entity::Entity;
use crate::error::LifeError;
use crate::record::Record;

/// `target.<foreign_key>` references `owner.<pk>`
#[derive(Debug, Clone)]
pub struct HasMany {
    core: RelationCore,
    foreign_key: String,
}

impl HasMany {
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

impl Relation for HasMany {
    fn core(&self) -> &RelationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RelationCore {
        &mut self.core
    }

    fn kind(&self) -> RelationKind {
        RelationKind::HasMany
    }
}
