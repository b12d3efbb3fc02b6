//! Predicate state for the query facade.
//!
//! Predicates are appended one at a time, joined by AND unless `or()` was
//! called just before. Brackets open nested groups. Inside a group AND binds
//! tighter than OR, as in SQL.

use super::column::column_expr;
use crate::error::LifeError;
use crate::value::Value;
use sea_query::{BinOper, CaseStatement, Condition, Expr, ExprTrait};
use std::str::FromStr;

/// Comparison operator for `filter` and weighted predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Comparator {
    pub(crate) fn apply(self, left: Expr, right: Expr) -> Expr {
        match self {
            Comparator::Eq => left.eq(right),
            Comparator::NotEq => left.ne(right),
            Comparator::Lt => left.lt(right),
            Comparator::Lte => left.lte(right),
            Comparator::Gt => left.gt(right),
            Comparator::Gte => left.gte(right),
            Comparator::Like => left.binary(BinOper::Like, right),
            Comparator::NotLike => left.binary(BinOper::NotLike, right),
        }
    }
}

impl FromStr for Comparator {
    type Err = LifeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Comparator::Eq),
            "!=" | "<>" => Ok(Comparator::NotEq),
            "<" => Ok(Comparator::Lt),
            "<=" => Ok(Comparator::Lte),
            ">" => Ok(Comparator::Gt),
            ">=" => Ok(Comparator::Gte),
            "like" => Ok(Comparator::Like),
            "not like" => Ok(Comparator::NotLike),
            other => Err(LifeError::Query(format!("unknown comparator `{}`", other))),
        }
    }
}

pub(crate) fn value_expr(value: &Value) -> Expr {
    Expr::val(sea_query::Value::from(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Expr),
    Group(Vec<(Connector, Node)>),
}

/// Accumulated WHERE clause with bracket groups
#[derive(Debug, Clone)]
pub(crate) struct ConditionTree {
    groups: Vec<Vec<(Connector, Node)>>,
    openers: Vec<Connector>,
    pending: Connector,
}

impl Default for ConditionTree {
    fn default() -> Self {
        Self {
            groups: vec![Vec::new()],
            openers: Vec::new(),
            pending: Connector::And,
        }
    }
}

impl ConditionTree {
    pub(crate) fn push(&mut self, expr: Expr) {
        let connector = std::mem::replace(&mut self.pending, Connector::And);
        if let Some(group) = self.groups.last_mut() {
            group.push((connector, Node::Leaf(expr)));
        }
    }

    pub(crate) fn or(&mut self) {
        self.pending = Connector::Or;
    }

    pub(crate) fn and(&mut self) {
        self.pending = Connector::And;
    }

    pub(crate) fn open(&mut self) {
        let connector = std::mem::replace(&mut self.pending, Connector::And);
        self.openers.push(connector);
        self.groups.push(Vec::new());
    }

    pub(crate) fn close(&mut self) {
        if self.groups.len() < 2 {
            log::warn!("close_bracket without a matching open_bracket ignored");
            return;
        }
        let items = self.groups.pop().unwrap_or_default();
        let connector = self.openers.pop().unwrap_or(Connector::And);
        if items.is_empty() {
            return;
        }
        if let Some(parent) = self.groups.last_mut() {
            parent.push((connector, Node::Group(items)));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }

    /// Fold into a sea-query condition; unclosed brackets are closed implicitly
    pub(crate) fn build(&self) -> Option<Condition> {
        let mut tree = self.clone();
        while tree.groups.len() > 1 {
            tree.close();
        }
        tree.groups.first().and_then(|root| fold(root))
    }
}

fn fold(items: &[(Connector, Node)]) -> Option<Condition> {
    if items.is_empty() {
        return None;
    }
    let mut any = Condition::any();
    let mut run = Condition::all();
    for (i, (connector, node)) in items.iter().enumerate() {
        if i > 0 && *connector == Connector::Or {
            any = any.add(std::mem::replace(&mut run, Condition::all()));
        }
        run = match node {
            Node::Leaf(expr) => run.add(expr.clone()),
            Node::Group(children) => match fold(children) {
                Some(cond) => run.add(cond),
                None => run,
            },
        };
    }
    Some(any.add(run))
}

/// Value a weighted predicate contributes when it does not match
#[derive(Debug, Clone)]
pub enum NonMatch {
    Weight(i64),
    Nested(Box<WeightedCondition>),
}

impl From<i64> for NonMatch {
    fn from(weight: i64) -> Self {
        NonMatch::Weight(weight)
    }
}

impl From<i32> for NonMatch {
    fn from(weight: i32) -> Self {
        NonMatch::Weight(weight as i64)
    }
}

impl From<WeightedCondition> for NonMatch {
    fn from(nested: WeightedCondition) -> Self {
        NonMatch::Nested(Box::new(nested))
    }
}

/// A ranking term: `CASE WHEN <field> <cmp> <value> THEN <weight> ELSE <non_match> END`
#[derive(Debug, Clone)]
pub struct WeightedCondition {
    field: String,
    comparator: Comparator,
    value: Value,
    weight: i64,
    non_match: NonMatch,
}

impl WeightedCondition {
    pub fn new(
        field: impl Into<String>,
        comparator: Comparator,
        value: impl Into<Value>,
        weight: i64,
        non_match: impl Into<NonMatch>,
    ) -> Self {
        Self {
            field: field.into(),
            comparator,
            value: value.into(),
            weight,
            non_match: non_match.into(),
        }
    }

    pub(crate) fn to_expr(&self) -> Expr {
        let matched = self
            .comparator
            .apply(column_expr(&self.field), value_expr(&self.value));
        let otherwise = match &self.non_match {
            NonMatch::Weight(w) => weight_literal(*w),
            NonMatch::Nested(nested) => nested.to_expr(),
        };
        CaseStatement::new()
            .case(matched, weight_literal(self.weight))
            .finally(otherwise)
            .into()
    }
}

// Inlined so the CASE branches are typed as integers; bound parameters there
// would be inferred as text by PostgreSQL.
fn weight_literal(weight: i64) -> Expr {
    Expr::cust(weight.to_string())
}

/// Constraints for a join, built in the callback passed to `join`/`left_join`
#[derive(Debug, Clone, Default)]
pub struct JoinConstraints {
    items: Vec<(Connector, Node)>,
}

impl JoinConstraints {
    /// `AND left <cmp> right`, both sides column references
    pub fn on(&mut self, left: &str, comparator: Comparator, right: &str) -> &mut Self {
        self.push(Connector::And, left, comparator, right)
    }

    /// `OR left <cmp> right`
    pub fn or_on(&mut self, left: &str, comparator: Comparator, right: &str) -> &mut Self {
        self.push(Connector::Or, left, comparator, right)
    }

    fn push(&mut self, connector: Connector, left: &str, comparator: Comparator, right: &str) -> &mut Self {
        let expr = comparator.apply(column_expr(left), column_expr(right));
        self.items.push((connector, Node::Leaf(expr)));
        self
    }

    pub(crate) fn build(&self) -> Condition {
        fold(&self.items).unwrap_or_else(Condition::all)
    }
}
