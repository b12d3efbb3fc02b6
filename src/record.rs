//! Records
//!
//! A [`Record`] is a shared handle to one row of an entity's table. Cloning
//! the handle does not copy the row: relation caches and collections hold
//! handles to the same record, so a value loaded once is seen everywhere.
//!
//! Field state is split into `original` (last known database values, every
//! declared field present) and `changed` (pending writes). Reads go through
//! [`Record::get_column`], which prefers pending values.

use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::LifeError;
use crate::query::{Comparator, ModelQuery};
use crate::relation::{eager_load, BelongsTo, BelongsToMany, EagerLoad, HasMany, HasOne, Relation};
use crate::value::{Row, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Resolved value of a relation in a record's cache
#[derive(Debug, Clone)]
pub enum RelationValue {
    /// Resolved, nothing matched
    Null,
    One(Record),
    Many(Collection),
}

impl RelationValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RelationValue::Null)
    }

    pub fn as_one(&self) -> Option<&Record> {
        match self {
            RelationValue::One(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&Collection> {
        match self {
            RelationValue::Many(collection) => Some(collection),
            _ => None,
        }
    }
}

struct RecordState {
    entity: Entity,
    config: String,
    select_columns: Vec<String>,
    original: Row,
    changed: Row,
    additional: Row,
    visible: Vec<String>,
    is_new: bool,
    relations: IndexMap<String, RelationValue>,
}

/// Shared handle to a mutable row
#[derive(Clone)]
pub struct Record {
    inner: Arc<RwLock<RecordState>>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Record")
            .field("table", &state.entity.table())
            .field("is_new", &state.is_new)
            .field("original", &state.original)
            .field("changed", &state.changed)
            .field("relations", &state.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Record {
    /// A new, unsaved record with every declared field set to null
    pub fn new(entity: &Entity) -> Self {
        let original = entity
            .schema()
            .names()
            .map(|name| (name.to_string(), Value::Null))
            .collect();
        Record {
            inner: Arc::new(RwLock::new(RecordState {
                entity: entity.clone(),
                config: entity.config().to_string(),
                select_columns: entity.select_columns(),
                original,
                changed: Row::new(),
                additional: Row::new(),
                visible: Vec::new(),
                is_new: true,
                relations: IndexMap::new(),
            })),
        }
    }

    /// Whether both handles point at the same record
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn entity(&self) -> Entity {
        self.inner.read().entity.clone()
    }

    pub fn table(&self) -> String {
        self.inner.read().entity.table().to_string()
    }

    pub fn primary_key(&self) -> String {
        self.inner.read().entity.primary_key().to_string()
    }

    /// Name of the connection this record reads and writes through
    pub fn config(&self) -> String {
        self.inner.read().config.clone()
    }

    pub fn set_config(&self, config: &str) -> &Self {
        self.inner.write().config = config.to_string();
        self
    }

    pub fn is_new(&self) -> bool {
        self.inner.read().is_new
    }

    /// Copy every key of `row` that is a declared field into `original`
    ///
    /// Marks the record as persisted. Unknown keys are ignored.
    pub fn load_data(&self, row: &Row) -> &Self {
        let mut state = self.inner.write();
        let entity = state.entity.clone();
        for (name, value) in row {
            if let Some(slot) = state.original.get_mut(name) {
                let column_type = entity
                    .schema()
                    .get(name)
                    .map(|f| f.column_type)
                    .unwrap_or_default();
                *slot = column_type.coerce(value.clone());
            }
        }
        state.is_new = false;
        self
    }

    /// Stage a write; names that are not declared fields are ignored
    pub fn set_column(&self, name: &str, value: impl Into<Value>) -> &Self {
        let mut state = self.inner.write();
        if state.entity.schema().contains(name) {
            state.changed.insert(name.to_string(), value.into());
        }
        self
    }

    pub fn set_columns<I, K, V>(&self, values: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in values {
            self.set_column(name.as_ref(), value);
        }
        self
    }

    /// Pending value if any, else the loaded value, else null
    pub fn get_column(&self, name: &str) -> Value {
        let state = self.inner.read();
        state
            .changed
            .get(name)
            .or_else(|| state.original.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Value of the primary key
    pub fn id(&self) -> Value {
        let pk = self.primary_key();
        self.get_column(&pk)
    }

    /// Loaded values with pending writes applied, in schema order
    pub fn get_data(&self) -> Row {
        let state = self.inner.read();
        let mut data = state.original.clone();
        for (name, value) in &state.changed {
            data.insert(name.clone(), value.clone());
        }
        data
    }

    pub fn original(&self) -> Row {
        self.inner.read().original.clone()
    }

    pub fn changed(&self) -> Row {
        self.inner.read().changed.clone()
    }

    pub fn has_changes(&self) -> bool {
        !self.inner.read().changed.is_empty()
    }

    /// Attach a value that is not part of the schema (joined, computed or pivot column)
    pub fn set_additional_column(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.inner
            .write()
            .additional
            .insert(name.to_string(), value.into());
        self
    }

    pub fn additional_column(&self, name: &str) -> Option<Value> {
        self.inner.read().additional.get(name).cloned()
    }

    pub fn additional_columns(&self) -> Row {
        self.inner.read().additional.clone()
    }

    /// Restrict serialization to `columns`; names that are neither fields nor
    /// additional columns are dropped. An empty set shows everything.
    pub fn set_visible_columns<I, S>(&self, columns: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.inner.write();
        let visible: Vec<String> = columns
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .filter(|c| state.original.contains_key(c) || state.additional.contains_key(c))
            .collect();
        state.visible = visible;
        self
    }

    pub fn visible_columns(&self) -> Vec<String> {
        self.inner.read().visible.clone()
    }

    /// Columns selected when this record builds a query; the primary key is always kept
    pub fn set_select_columns<I, S>(&self, columns: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.inner.write();
        let table = state.entity.table().to_string();
        let pk = state.entity.primary_key().to_string();
        let mut selected = vec![format!("{}.{}", table, pk)];
        for column in columns {
            let column = column.as_ref();
            let name = column.strip_prefix(&format!("{}.", table)).unwrap_or(column);
            if name != pk && state.entity.schema().contains(name) {
                selected.push(format!("{}.{}", table, name));
            }
        }
        state.select_columns = selected;
        self
    }

    pub fn select_columns(&self) -> Vec<String> {
        self.inner.read().select_columns.clone()
    }

    /// Cache a resolved relation; only declared relation names are accepted
    pub fn set_relation(&self, name: &str, value: RelationValue) -> bool {
        let mut state = self.inner.write();
        if !state.entity.declares_relation(name) {
            log::debug!(
                "ignoring relation `{}` not declared on `{}`",
                name,
                state.entity.table()
            );
            return false;
        }
        state.relations.insert(name.to_string(), value);
        true
    }

    /// Cached relation value; `None` means it was never resolved
    pub fn get_relation(&self, name: &str) -> Option<RelationValue> {
        self.inner.read().relations.get(name).cloned()
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.inner.read().relations.contains_key(name)
    }

    /// Build the relation registered under `name`, bound to this record
    ///
    /// # Errors
    ///
    /// Returns `LifeError::InvalidRelation` if the entity declares no such relation.
    pub fn relation(&self, name: &str) -> Result<Box<dyn Relation>, LifeError> {
        let entity = self.entity();
        let factory = entity.relation_factory(name)?;
        factory(self)
    }

    pub fn belongs_to(&self, target: Entity, foreign_key: &str) -> Result<BelongsTo, LifeError> {
        BelongsTo::new(self, target, foreign_key)
    }

    pub fn has_one(&self, target: Entity, foreign_key: &str) -> Result<HasOne, LifeError> {
        HasOne::new(self, target, foreign_key)
    }

    pub fn has_many(&self, target: Entity, foreign_key: &str) -> Result<HasMany, LifeError> {
        HasMany::new(self, target, foreign_key)
    }

    pub fn belongs_to_many(
        &self,
        target: Entity,
        link_table: &str,
        primary_foreign_key: &str,
        secondary_foreign_key: &str,
    ) -> Result<BelongsToMany, LifeError> {
        BelongsToMany::new(self, target, link_table, primary_foreign_key, secondary_foreign_key)
    }

    /// Query over this record's table producing records of its entity
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Configuration` if the record's connection is not registered.
    pub fn query(&self) -> Result<ModelQuery, LifeError> {
        let (config, entity, columns) = {
            let state = self.inner.read();
            (
                state.config.clone(),
                state.entity.clone(),
                state.select_columns.clone(),
            )
        };
        let mut query = ModelQuery::new(&config)?;
        query.table(entity.table()).cols(columns).to_model(&entity);
        if let Some(field) = entity.incrementing_field() {
            query.set_incrementing_field(field);
        }
        Ok(query)
    }

    /// Same as [`Record::query`]
    pub fn all(&self) -> Result<ModelQuery, LifeError> {
        self.query()
    }

    /// Load the record of this entity whose primary key equals `id`, on this record's connection
    pub fn find(&self, id: impl Into<Value>) -> Result<Option<Record>, LifeError> {
        let entity = self.entity();
        let mut query = self.query()?;
        query
            .filter(
                &format!("{}.{}", entity.table(), entity.primary_key()),
                Comparator::Eq,
                id,
            )
            .limit(1);
        Ok(query.fetch_models()?.first().cloned())
    }

    /// Insert if new, otherwise update the pending fields by primary key
    ///
    /// Returns whether a row was written. On success pending values move into
    /// `original`, and a generated insert id becomes the primary key.
    ///
    /// # Errors
    ///
    /// Engine failures are returned unchanged; the record is left as it was.
    pub fn save(&self) -> Result<bool, LifeError> {
        let (entity, is_new, mut payload, key) = {
            let state = self.inner.read();
            let pk = state.entity.primary_key();
            (
                state.entity.clone(),
                state.is_new,
                state.changed.clone(),
                state.original.get(pk).cloned().unwrap_or(Value::Null),
            )
        };
        let pk = entity.primary_key().to_string();
        let mut query = self.query()?;

        let result = if is_new {
            query.insert(&payload)?
        } else {
            if payload.shift_remove(&pk).is_some() {
                log::warn!(
                    "primary key `{}` of `{}` is not updatable, change ignored",
                    pk,
                    entity.table()
                );
            }
            if payload.is_empty() {
                self.inner.write().changed.shift_remove(&pk);
                return Ok(false);
            }
            query.filter(&pk, Comparator::Eq, key).update(&payload)?
        };

        if result.rows_affected == 0 {
            return Ok(false);
        }

        let mut state = self.inner.write();
        if is_new {
            if let Some(id) = result.insert_id {
                payload.insert(pk.clone(), Value::Int(id));
            }
            state.is_new = false;
        } else {
            state.changed.shift_remove(&pk);
        }
        for (name, value) in payload {
            if state.changed.get(&name) == Some(&value) {
                state.changed.shift_remove(&name);
            }
            state.original.insert(name, value);
        }
        if is_new {
            // a pending key superseded by the generated one
            state.changed.shift_remove(&pk);
        }
        Ok(true)
    }

    /// Delete the row by primary key, returning whether a row was removed
    ///
    /// # Errors
    ///
    /// Returns `LifeError::InvalidState` without touching the engine if the record was never saved.
    pub fn delete(&self) -> Result<bool, LifeError> {
        let (is_new, pk, key) = {
            let state = self.inner.read();
            let pk = state.entity.primary_key().to_string();
            let key = state.original.get(&pk).cloned().unwrap_or(Value::Null);
            (state.is_new, pk, key)
        };
        if is_new {
            return Err(LifeError::InvalidState(format!(
                "cannot delete an unsaved `{}` record",
                self.table()
            )));
        }
        let mut query = self.query()?;
        let result = query.filter(&pk, Comparator::Eq, key).delete()?;
        Ok(result.rows_affected > 0)
    }

    /// Eager-load relation paths for this record alone
    pub fn eager_load(&self, paths: &EagerLoad) -> Result<(), LifeError> {
        let collection: Collection = std::iter::once(self.clone()).collect();
        eager_load(&collection, paths)
    }

    /// Serialize fields, additional columns and cached relations
    ///
    /// Fields and additional columns are filtered by the visible set when it is
    /// non-empty. Relations cached as null are omitted.
    pub fn to_json(&self) -> serde_json::Value {
        let (data, relations) = {
            let state = self.inner.read();
            let mut data = state.original.clone();
            for (name, value) in &state.changed {
                data.insert(name.clone(), value.clone());
            }
            for (name, value) in &state.additional {
                data.insert(name.clone(), value.clone());
            }
            if !state.visible.is_empty() {
                data.retain(|name, _| state.visible.iter().any(|v| v == name));
            }
            (data, state.relations.clone())
        };

        let mut object = serde_json::Map::new();
        for (name, value) in data {
            object.insert(name, value.to_json());
        }
        for (name, relation) in relations {
            match relation {
                RelationValue::Null => {}
                RelationValue::One(record) => {
                    object.insert(name, record.to_json());
                }
                RelationValue::Many(collection) => {
                    object.insert(name, collection.to_json());
                }
            }
        }
        serde_json::Value::Object(object)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
