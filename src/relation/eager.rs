//! Eager loading of relation paths across a collection.
//!
//! # Strategy
//!
//! For each dotted path (`"author.country"`), one level at a time:
//! 1. Build the head relation once, from the first record of the collection
//! 2. Owners that already hold the relation keep it; their related records
//!    carry over to the next level
//! 3. The remaining owner ids are de-duplicated and fetched in one IN query
//! 4. Rows are grouped by the synthetic owner-key column and cached on every
//!    owner, so owners sharing an id share the same related handles
//! 5. Related records of this level form the collection for the rest of the path
//!
//! A path of depth `n` therefore costs at most `n` queries, regardless of how
//! many records are loaded.

use crate::collection::Collection;
use crate::error::LifeError;
use crate::query::ModelQuery;
use crate::record::{Record, RelationValue};
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Adjusts a relation query before it runs (ordering, extra filters)
pub type QueryCustomizer = Arc<dyn Fn(&mut ModelQuery) + Send + Sync>;

/// Ordered set of relation paths, each with an optional query customizer
///
/// The customizer applies to the last segment of its path.
///
/// ```no_run
/// # use lifeline::{Collection, EagerLoad, LifeError, Order};
/// # fn load(books: &Collection) -> Result<(), LifeError> {
/// let paths = EagerLoad::new()
///     .path("author.country")
///     .path_with("tags", |q| {
///         q.order("tags.label", Order::Asc);
///     });
/// books.eager_load(&paths)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct EagerLoad {
    paths: IndexMap<String, Option<QueryCustomizer>>,
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.paths.iter().map(|(path, c)| (path, c.is_some())))
            .finish()
    }
}

impl EagerLoad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.paths.insert(path.into(), None);
        self
    }

    pub fn path_with<F>(mut self, path: impl Into<String>, customizer: F) -> Self
    where
        F: Fn(&mut ModelQuery) + Send + Sync + 'static,
    {
        self.paths.insert(path.into(), Some(Arc::new(customizer)));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&QueryCustomizer>)> {
        self.paths.iter().map(|(path, c)| (path.as_str(), c.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for EagerLoad {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        iter.into_iter().fold(EagerLoad::new(), |paths, path| paths.path(path))
    }
}

/// Resolve every path of `paths` on every record of `collection`
///
/// # Errors
///
/// Returns `LifeError::InvalidRelation` for a path segment the entity does
/// not declare, before any query for that segment runs. Engine failures are
/// returned unchanged; relations cached before the failure stay cached.
pub fn eager_load(collection: &Collection, paths: &EagerLoad) -> Result<(), LifeError> {
    for (path, customizer) in paths.iter() {
        load_path(collection, path, customizer)?;
    }
    Ok(())
}

fn empty_value(many: bool) -> RelationValue {
    if many {
        RelationValue::Many(Collection::new())
    } else {
        RelationValue::Null
    }
}

fn carry_over(value: &RelationValue, next: &mut Collection) {
    match value {
        RelationValue::Null => {}
        RelationValue::One(record) => {
            next.add(record.clone());
        }
        RelationValue::Many(collection) => next.extend(collection.iter().cloned()),
    }
}

fn load_path(
    collection: &Collection,
    path: &str,
    customizer: Option<&QueryCustomizer>,
) -> Result<(), LifeError> {
    let Some(first) = collection.first() else {
        return Ok(());
    };
    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    if head.is_empty() {
        return Err(LifeError::InvalidRelation {
            relation: path.to_string(),
            table: first.table(),
        });
    }

    let mut relation = first.relation(head)?;
    if rest.is_empty() {
        if let Some(customize) = customizer {
            customize(relation.query_mut());
        }
    }
    let many = relation.returns_many();

    let mut next = Collection::new();
    let mut ids: IndexSet<Value> = IndexSet::new();
    let mut pending: Vec<Record> = Vec::new();
    for owner in collection {
        if let Some(cached) = owner.get_relation(head) {
            carry_over(&cached, &mut next);
            continue;
        }
        let id = owner.id();
        if id.is_null() {
            owner.set_relation(head, empty_value(many));
            continue;
        }
        ids.insert(id);
        pending.push(owner.clone());
    }

    if !ids.is_empty() {
        let ids: Vec<Value> = ids.into_iter().collect();
        log::debug!(
            "eager loading `{}` from `{}` for {} owner id(s)",
            head,
            first.table(),
            ids.len()
        );
        let groups = relation.get_results_grouped(&ids)?;

        let mut expanded: HashSet<Value> = HashSet::new();
        for owner in pending {
            if owner.has_relation(head) {
                continue;
            }
            let id = owner.id();
            let value = match groups.get(&id) {
                None => empty_value(many),
                Some(group) if many => RelationValue::Many(group.clone()),
                Some(group) => match group.first() {
                    Some(record) => RelationValue::One(record.clone()),
                    None => RelationValue::Null,
                },
            };
            if expanded.insert(id) {
                carry_over(&value, &mut next);
            }
            owner.set_relation(head, value);
        }
    }

    if !rest.is_empty() && !next.is_empty() {
        load_path(&next, rest, customizer)?;
    }
    Ok(())
}
