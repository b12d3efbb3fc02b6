//! Query facade
//!
//! [`ModelQuery`] accumulates table, column, predicate, join, ordering and
//! pagination state, renders it with sea-query and hands the statement to the
//! executor registered under the query's connection name. Rows returned by
//! `fetch_models`/`stream_models` become records of the target entity.
//!
//! Builder methods take `&mut self` so a query can be customized in place,
//! which is what eager-load callbacks receive.
//!
//! ```no_run
//! # use lifeline::{Comparator, LifeError, ModelQuery, Order};
//! # fn main() -> Result<(), LifeError> {
//! let mut query = ModelQuery::new("main")?;
//! query
//!     .table("books")
//!     .cols(["books.id", "books.title"])
//!     .filter("books.title", Comparator::Like, "%rust%")
//!     .order("books.title", Order::Asc)
//!     .limit(10);
//! let rows = query.fetch()?;
//! # assert!(rows.len() <= 10);
//! # Ok(())
//! # }
//! ```

pub mod column;
pub mod condition;
mod execution;

pub use column::{ColumnSpec, TableSpec};
pub use condition::{Comparator, JoinConstraints, NonMatch, WeightedCondition};
pub use execution::Page;
pub use sea_query::Order;

use crate::connection;
use crate::entity::Entity;
use crate::error::LifeError;
use crate::executor::LifeExecutor;
use crate::value::{Row, Value};
use column::{column_expr, Name};
use condition::{value_expr, ConditionTree};
use sea_query::{Condition, Expr, ExprTrait, JoinType, Query, SelectStatement};
use std::fmt;
use std::sync::Arc;

/// Alias of the synthetic ranking column produced by weighted predicates
pub const WEIGHT_COLUMN: &str = "__condition_weight";

#[derive(Debug, Clone)]
struct Join {
    kind: JoinType,
    table: TableSpec,
    on: Condition,
}

/// Fluent query builder bound to a named connection
#[derive(Clone)]
pub struct ModelQuery {
    config: String,
    executor: Arc<dyn LifeExecutor>,
    table: Option<TableSpec>,
    columns: Vec<String>,
    joins: Vec<Join>,
    conditions: ConditionTree,
    weights: Vec<WeightedCondition>,
    orders: Vec<(String, Order)>,
    groups: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    target: Option<Entity>,
    incrementing_field: Option<String>,
    values: Vec<Row>,
}

impl fmt::Debug for ModelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("config", &self.config)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl ModelQuery {
    /// Start a query on the connection registered under `config`
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Configuration` if no connection is registered under that name.
    pub fn new(config: &str) -> Result<Self, LifeError> {
        let executor = connection::start_query(config)?;
        Ok(Self::with_executor(config, executor))
    }

    /// Start a query on an explicit executor
    pub fn with_executor(config: &str, executor: Arc<dyn LifeExecutor>) -> Self {
        Self {
            config: config.to_string(),
            executor,
            table: None,
            columns: Vec::new(),
            joins: Vec::new(),
            conditions: ConditionTree::default(),
            weights: Vec::new(),
            orders: Vec::new(),
            groups: Vec::new(),
            limit: None,
            offset: None,
            target: None,
            incrementing_field: None,
            values: Vec::new(),
        }
    }

    /// A fresh query on the same connection
    pub fn new_query(&self) -> Self {
        Self::with_executor(&self.config, Arc::clone(&self.executor))
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    pub(crate) fn executor(&self) -> &Arc<dyn LifeExecutor> {
        &self.executor
    }

    /// Set the table, optionally aliased: `"books"` or `"books __primary__"`
    pub fn table(&mut self, spec: &str) -> &mut Self {
        self.table = Some(TableSpec::parse(spec));
        self
    }

    pub fn table_spec(&self) -> Option<&TableSpec> {
        self.table.as_ref()
    }

    /// Replace the selected columns
    pub fn cols<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Append one selected column
    pub fn add_col(&mut self, col: impl Into<String>) -> &mut Self {
        self.columns.push(col.into());
        self
    }

    /// Drop a selected column, matched verbatim or by output name
    pub fn remove_col(&mut self, name: &str) -> &mut Self {
        self.columns
            .retain(|c| !ColumnSpec::parse(c).matches(c, name));
        self
    }

    pub fn remove_cols<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.remove_col(name.as_ref());
        }
        self
    }

    /// Keep only the listed columns
    pub fn keep_cols<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        self.columns.retain(|c| {
            let spec = ColumnSpec::parse(c);
            names.iter().any(|n| spec.matches(c, n.as_ref()))
        });
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows fetched through `fetch_models` become records of `entity`
    pub fn to_model(&mut self, entity: &Entity) -> &mut Self {
        self.target = Some(entity.clone());
        self
    }

    pub fn target(&self) -> Option<&Entity> {
        self.target.as_ref()
    }

    /// Inserts report the generated value of `field` as their insert id
    pub fn set_incrementing_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.incrementing_field = Some(field.into());
        self
    }

    /// `field <cmp> value`
    pub fn filter(&mut self, field: &str, comparator: Comparator, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        self.conditions
            .push(comparator.apply(column_expr(field), value_expr(&value)));
        self
    }

    pub fn where_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<sea_query::Value> = values.into_iter().map(|v| v.into().into()).collect();
        self.conditions.push(column_expr(field).is_in(values));
        self
    }

    pub fn where_not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<sea_query::Value> = values.into_iter().map(|v| v.into().into()).collect();
        self.conditions.push(column_expr(field).is_not_in(values));
        self
    }

    /// `field IN (<subquery>)`
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Query` if the subquery has no table.
    pub fn where_in_query(&mut self, field: &str, subquery: &ModelQuery) -> Result<&mut Self, LifeError> {
        let statement = subquery.select_statement()?;
        self.conditions.push(column_expr(field).in_subquery(statement));
        Ok(self)
    }

    pub fn where_not_in_query(&mut self, field: &str, subquery: &ModelQuery) -> Result<&mut Self, LifeError> {
        let statement = subquery.select_statement()?;
        self.conditions.push(column_expr(field).not_in_subquery(statement));
        Ok(self)
    }

    pub fn where_null(&mut self, field: &str) -> &mut Self {
        self.conditions.push(column_expr(field).is_null());
        self
    }

    pub fn where_not_null(&mut self, field: &str) -> &mut Self {
        self.conditions.push(column_expr(field).is_not_null());
        self
    }

    /// Rank rows by `weight` when `field <cmp> value` holds, `non_match` otherwise
    ///
    /// All weighted terms are summed into [`WEIGHT_COLUMN`] and results are
    /// ordered by it, highest first, ahead of any other ordering.
    pub fn weighted_where(
        &mut self,
        field: &str,
        comparator: Comparator,
        value: impl Into<Value>,
        weight: i64,
        non_match: impl Into<NonMatch>,
    ) -> &mut Self {
        self.weights.push(WeightedCondition::new(
            field, comparator, value, weight, non_match,
        ));
        self
    }

    /// Build a weighted term to nest as another term's non-match value
    pub fn sub_weighted_where(
        field: &str,
        comparator: Comparator,
        value: impl Into<Value>,
        weight: i64,
        non_match: impl Into<NonMatch>,
    ) -> WeightedCondition {
        WeightedCondition::new(field, comparator, value, weight, non_match)
    }

    /// The next predicate is joined with OR
    pub fn or(&mut self) -> &mut Self {
        self.conditions.or();
        self
    }

    /// The next predicate is joined with AND (the default)
    pub fn and(&mut self) -> &mut Self {
        self.conditions.and();
        self
    }

    pub fn open_bracket(&mut self) -> &mut Self {
        self.conditions.open();
        self
    }

    pub fn close_bracket(&mut self) -> &mut Self {
        self.conditions.close();
        self
    }

    /// Inner join with constraints built by `on`
    pub fn join<F>(&mut self, table: &str, on: F) -> &mut Self
    where
        F: FnOnce(&mut JoinConstraints),
    {
        self.push_join(JoinType::InnerJoin, table, on)
    }

    /// Inner join on `left = right`
    pub fn join_on(&mut self, table: &str, left: &str, right: &str) -> &mut Self {
        self.join(table, |c| {
            c.on(left, Comparator::Eq, right);
        })
    }

    pub fn left_join<F>(&mut self, table: &str, on: F) -> &mut Self
    where
        F: FnOnce(&mut JoinConstraints),
    {
        self.push_join(JoinType::LeftJoin, table, on)
    }

    pub fn left_join_on(&mut self, table: &str, left: &str, right: &str) -> &mut Self {
        self.left_join(table, |c| {
            c.on(left, Comparator::Eq, right);
        })
    }

    fn push_join<F>(&mut self, kind: JoinType, table: &str, on: F) -> &mut Self
    where
        F: FnOnce(&mut JoinConstraints),
    {
        let mut constraints = JoinConstraints::default();
        on(&mut constraints);
        self.joins.push(Join {
            kind,
            table: TableSpec::parse(table),
            on: constraints.build(),
        });
        self
    }

    pub fn order(&mut self, field: &str, order: Order) -> &mut Self {
        self.orders.push((field.to_string(), order));
        self
    }

    pub fn group<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Stage a row for [`ModelQuery::save`]
    pub fn values(&mut self, row: Row) -> &mut Self {
        self.values.push(row);
        self
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    fn table_or_err(&self) -> Result<&TableSpec, LifeError> {
        self.table
            .as_ref()
            .ok_or_else(|| LifeError::Query("no table set on query".to_string()))
    }

    /// Render the SELECT statement for the current state
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Query` if no table has been set.
    pub fn select_statement(&self) -> Result<SelectStatement, LifeError> {
        let table = self.table_or_err()?;
        let mut select = Query::select();
        match &table.alias {
            Some(alias) => select.from_as(Name::new(table.name.clone()), Name::new(alias.clone())),
            None => select.from(Name::new(table.name.clone())),
        };

        if self.columns.is_empty() {
            select.expr(Expr::col(sea_query::Asterisk));
        }
        for col in &self.columns {
            let spec = ColumnSpec::parse(col);
            match &spec.alias {
                Some(alias) => select.expr_as(spec.expr(), Name::new(alias.clone())),
                None => select.expr(spec.expr()),
            };
        }

        if let Some(total) = self
            .weights
            .iter()
            .map(WeightedCondition::to_expr)
            .reduce(|acc, term| acc.add(term))
        {
            select.expr_as(total, Name::new(WEIGHT_COLUMN));
        }

        for join in &self.joins {
            match &join.table.alias {
                Some(alias) => select.join_as(
                    join.kind,
                    Name::new(join.table.name.clone()),
                    Name::new(alias.clone()),
                    join.on.clone(),
                ),
                None => select.join(join.kind, Name::new(join.table.name.clone()), join.on.clone()),
            };
        }

        if let Some(cond) = self.conditions.build() {
            select.cond_where(cond);
        }

        if !self.groups.is_empty() {
            select.add_group_by(self.groups.iter().map(|g| column_expr(g)));
        }

        if !self.weights.is_empty() {
            select.order_by_expr(Expr::col(Name::new(WEIGHT_COLUMN)), Order::Desc);
        }
        for (field, order) in &self.orders {
            select.order_by_expr(column_expr(field), order.clone());
        }

        if let Some(limit) = self.limit {
            select.limit(limit);
        }
        if let Some(offset) = self.offset {
            select.offset(offset);
        }
        Ok(select)
    }
}
