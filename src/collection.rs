//! Identity-indexed record collections
//!
//! A [`Collection`] keeps records in insertion order and indexes them by
//! primary-key value. Several records may share a key (rows repeated by a
//! join), so the index maps each key to a bucket.

use crate::error::LifeError;
use crate::record::Record;
use crate::relation::{eager_load, EagerLoad};
use crate::value::{Row, Value};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Default)]
pub struct Collection {
    records: Vec<Record>,
    index: HashMap<Value, Vec<usize>>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records.iter()).finish()
    }
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, indexing it under its current primary-key value
    pub fn add(&mut self, record: Record) -> &mut Self {
        let key = record.id();
        self.index
            .entry(key)
            .or_default()
            .push(self.records.len());
        self.records.push(record);
        self
    }

    /// Every record whose primary key equals `id`, in insertion order
    pub fn find(&self, id: impl Into<Value>) -> Option<Vec<Record>> {
        self.index.get(&id.into()).map(|bucket| {
            bucket
                .iter()
                .map(|&i| self.records[i].clone())
                .collect()
        })
    }

    /// Whether any record is indexed under `id`
    pub fn contains(&self, id: &Value) -> bool {
        self.index.contains_key(id)
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A fresh traversal over the records
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Distinct primary-key values, in first-seen order
    pub fn ids(&self) -> Vec<Value> {
        let mut seen = Vec::with_capacity(self.index.len());
        for record in &self.records {
            let id = record.id();
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }

    /// Merged field data of every record
    pub fn to_list(&self) -> Vec<Row> {
        self.records.iter().map(Record::get_data).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.records.iter().map(Record::to_json).collect())
    }

    /// Apply the same visible-column set to every record
    pub fn set_visible_columns<S: AsRef<str>>(&self, columns: &[S]) -> &Self {
        for record in &self.records {
            record.set_visible_columns(columns.iter().map(AsRef::as_ref));
        }
        self
    }

    /// Save every record, each in its own coroutine
    ///
    /// All saves run to completion before this returns. The result is the
    /// number of records that wrote a row, or the first error in collection
    /// order once every save has settled.
    pub fn save(&self) -> Result<usize, LifeError> {
        let handles: Vec<_> = self
            .records
            .iter()
            .cloned()
            .map(|record| may::go!(move || record.save()))
            .collect();

        let mut saved = 0;
        let mut first_error = None;
        for (position, handle) in handles.into_iter().enumerate() {
            let outcome = handle.join().unwrap_or_else(|_| {
                Err(LifeError::Persistence("save coroutine panicked".to_string()))
            });
            match outcome {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("saving record {} of collection failed: {}", position, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    /// Eager-load relation paths across the whole collection
    pub fn eager_load(&self, paths: &EagerLoad) -> Result<(), LifeError> {
        eager_load(self, paths)
    }
}

impl FromIterator<Record> for Collection {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut collection = Collection::new();
        for record in iter {
            collection.add(record);
        }
        collection
    }
}

impl Extend<Record> for Collection {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        for record in iter {
            self.add(record);
        }
    }
}

impl IntoIterator for Collection {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
