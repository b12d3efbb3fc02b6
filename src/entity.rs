//! Entity definitions
//!
//! An [`Entity`] describes one table: the named connection it lives on, its
//! primary key, an ordered schema of `(name, ColumnType)` fields, an optional
//! auto-increment field, and a registry of relation factories keyed by name.
//!
//! Relation targets are given as `fn() -> Entity`, so two entities can refer
//! to each other without building an infinite structure:
//!
//! ```no_run
//! # use lifeline::{ColumnType, Entity};
//! fn author() -> Entity {
//!     Entity::builder("main", "authors", "id")
//!         .field("id", ColumnType::Int)
//!         .field("name", ColumnType::String)
//!         .has_many("books", book, "author_id")
//!         .build()
//!         .expect("valid entity")
//! }
//!
//! fn book() -> Entity {
//!     Entity::builder("main", "books", "id")
//!         .fields(["id", "title", "author_id"])
//!         .incrementing("id")
//!         .belongs_to("author", author, "author_id")
//!         .build()
//!         .expect("valid entity")
//! }
//! ```

use crate::error::LifeError;
use crate::query::ModelQuery;
use crate::record::Record;
use crate::relation::{BelongsTo, BelongsToMany, HasMany, HasOne, Relation};
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    String,
    Bytes,
}

impl ColumnType {
    /// Coerce a loaded value towards this type; values that do not convert are kept as-is
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (ColumnType::Int, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::String(s),
            },
            (ColumnType::Int, Value::Bool(b)) => Value::Int(b as i64),
            (ColumnType::Float, Value::Int(i)) => Value::Float(i as f64),
            (ColumnType::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(s),
            },
            (ColumnType::Bool, Value::Int(i)) => Value::Bool(i != 0),
            (ColumnType::String, Value::Int(i)) => Value::String(i.to_string()),
            (_, value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub column_type: ColumnType,
}

/// Ordered field list of an entity
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push(&mut self, name: String, column_type: ColumnType) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.column_type = column_type,
            None => self.fields.push(Field { name, column_type }),
        }
    }
}

/// Builds a relation bound to the given owner record
pub type RelationFactory =
    Arc<dyn Fn(&Record) -> Result<Box<dyn Relation>, LifeError> + Send + Sync>;

#[derive(Clone)]
struct EntityDef {
    config: String,
    table: String,
    primary_key: String,
    schema: Schema,
    incrementing: Option<String>,
    relations: IndexMap<String, RelationFactory>,
}

/// Shared, immutable definition of a table-backed record type
#[derive(Clone)]
pub struct Entity {
    def: Arc<EntityDef>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("config", &self.def.config)
            .field("table", &self.def.table)
            .field("primary_key", &self.def.primary_key)
            .field("schema", &self.def.schema)
            .field("relations", &self.def.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Entity {
    /// Start defining an entity on connection `config`, table `table`, keyed by `primary_key`
    ///
    /// An empty `config` makes records inherit the connection of whatever
    /// query or relation loads them.
    pub fn builder(config: &str, table: &str, primary_key: &str) -> EntityBuilder {
        EntityBuilder {
            def: EntityDef {
                config: config.to_string(),
                table: table.to_string(),
                primary_key: primary_key.to_string(),
                schema: Schema::default(),
                incrementing: None,
                relations: IndexMap::new(),
            },
        }
    }

    pub fn config(&self) -> &str {
        &self.def.config
    }

    pub fn table(&self) -> &str {
        &self.def.table
    }

    pub fn primary_key(&self) -> &str {
        &self.def.primary_key
    }

    pub fn schema(&self) -> &Schema {
        &self.def.schema
    }

    pub fn incrementing_field(&self) -> Option<&str> {
        self.def.incrementing.as_deref()
    }

    /// The same definition bound to another connection
    pub fn with_config(&self, config: &str) -> Entity {
        let mut def = (*self.def).clone();
        def.config = config.to_string();
        Entity { def: Arc::new(def) }
    }

    /// Every declared field, qualified with the table name
    pub fn select_columns(&self) -> Vec<String> {
        self.def
            .schema
            .names()
            .map(|name| format!("{}.{}", self.def.table, name))
            .collect()
    }

    pub fn declares_relation(&self, name: &str) -> bool {
        self.def.relations.contains_key(name)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.def.relations.keys().map(String::as_str)
    }

    pub(crate) fn relation_factory(&self, name: &str) -> Result<&RelationFactory, LifeError> {
        self.def
            .relations
            .get(name)
            .ok_or_else(|| LifeError::InvalidRelation {
                relation: name.to_string(),
                table: self.def.table.clone(),
            })
    }

    /// A fresh, unsaved record
    pub fn new_record(&self) -> Record {
        Record::new(self)
    }

    /// Query over this entity's table, producing records of this entity
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Configuration` if the entity's connection is not registered.
    pub fn all(&self) -> Result<ModelQuery, LifeError> {
        self.new_record().query()
    }

    /// Load the record whose primary key equals `id`
    ///
    /// Returns `Ok(None)` when no row matches.
    pub fn find(&self, id: impl Into<Value>) -> Result<Option<Record>, LifeError> {
        self.new_record().find(id)
    }
}

/// Builder returned by [`Entity::builder`]
pub struct EntityBuilder {
    def: EntityDef,
}

impl EntityBuilder {
    pub fn field(mut self, name: &str, column_type: ColumnType) -> Self {
        self.def.schema.push(name.to_string(), column_type);
        self
    }

    /// Declare several untyped fields
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.def.schema.push(name.into(), ColumnType::Any);
        }
        self
    }

    /// Mark `field` as generated by the database on insert
    pub fn incrementing(mut self, field: &str) -> Self {
        self.def.incrementing = Some(field.to_string());
        self
    }

    /// Register a relation under `name` with a custom factory
    pub fn relation<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Record) -> Result<Box<dyn Relation>, LifeError> + Send + Sync + 'static,
    {
        self.def.relations.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// The owner holds `foreign_key`, pointing at the target's primary key
    pub fn belongs_to(self, name: &str, target: fn() -> Entity, foreign_key: &str) -> Self {
        let foreign_key = foreign_key.to_string();
        self.relation(name, move |owner| {
            Ok(Box::new(BelongsTo::new(owner, target(), &foreign_key)?) as Box<dyn Relation>)
        })
    }

    /// The target holds `foreign_key`, pointing at the owner's primary key; at most one match
    pub fn has_one(self, name: &str, target: fn() -> Entity, foreign_key: &str) -> Self {
        let foreign_key = foreign_key.to_string();
        self.relation(name, move |owner| {
            Ok(Box::new(HasOne::new(owner, target(), &foreign_key)?) as Box<dyn Relation>)
        })
    }

    /// The target holds `foreign_key`, pointing at the owner's primary key
    pub fn has_many(self, name: &str, target: fn() -> Entity, foreign_key: &str) -> Self {
        let foreign_key = foreign_key.to_string();
        self.relation(name, move |owner| {
            Ok(Box::new(HasMany::new(owner, target(), &foreign_key)?) as Box<dyn Relation>)
        })
    }

    /// Many-to-many through `link_table`
    ///
    /// `primary_foreign_key` references the owner, `secondary_foreign_key` the target.
    pub fn belongs_to_many(
        self,
        name: &str,
        target: fn() -> Entity,
        link_table: &str,
        primary_foreign_key: &str,
        secondary_foreign_key: &str,
    ) -> Self {
        self.belongs_to_many_with(name, target, link_table, primary_foreign_key, secondary_foreign_key, &[])
    }

    /// Many-to-many carrying pivot `link_columns` onto each related record
    pub fn belongs_to_many_with(
        self,
        name: &str,
        target: fn() -> Entity,
        link_table: &str,
        primary_foreign_key: &str,
        secondary_foreign_key: &str,
        link_columns: &[&str],
    ) -> Self {
        let link_table = link_table.to_string();
        let primary = primary_foreign_key.to_string();
        let secondary = secondary_foreign_key.to_string();
        let link_columns: Vec<String> = link_columns.iter().map(|c| c.to_string()).collect();
        self.relation(name, move |owner| {
            let mut relation = BelongsToMany::new(owner, target(), &link_table, &primary, &secondary)?;
            relation.set_link_columns(&link_columns);
            Ok(Box::new(relation) as Box<dyn Relation>)
        })
    }

    /// Finish the definition
    ///
    /// The primary key is added to the schema if it was not declared.
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Constraint` if the incrementing field is not a declared field.
    pub fn build(mut self) -> Result<Entity, LifeError> {
        if !self.def.schema.contains(&self.def.primary_key) {
            let pk = self.def.primary_key.clone();
            self.def.schema.fields.insert(
                0,
                Field {
                    name: pk,
                    column_type: ColumnType::Any,
                },
            );
        }
        if let Some(field) = &self.def.incrementing {
            if !self.def.schema.contains(field) {
                return Err(LifeError::Constraint(format!(
                    "incrementing field `{}` is not declared on table `{}`",
                    field, self.def.table
                )));
            }
        }
        Ok(Entity {
            def: Arc::new(self.def),
        })
    }
}
