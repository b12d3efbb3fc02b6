//! Column and table references written as plain strings.
//!
//! The facade accepts the forms callers write in SQL:
//!
//! ```text
//! "name"                              column
//! "books.title"                       qualified column
//! "__primary__.id __table_books__key" qualified column with alias
//! "books.title AS heading"            alias with AS
//! "*" / "books.*"                     everything
//! "books __primary__"                 table with alias
//! ```

use sea_query::{Asterisk, Expr, Iden};

/// An identifier taken verbatim from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Name(pub(crate) String);

impl Name {
    pub(crate) fn new(s: impl Into<String>) -> Self {
        Name(s.into())
    }
}

impl Iden for Name {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Split `"<ref> [AS] <alias>"` into its reference and optional alias
fn split_alias(spec: &str) -> (&str, Option<&str>) {
    let mut parts = spec.split_whitespace();
    let reference = parts.next().unwrap_or("");
    let alias = match parts.next() {
        Some(word) if word.eq_ignore_ascii_case("as") => parts.next(),
        other => other,
    };
    (reference, alias)
}

/// A parsed select column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub table: Option<String>,
    pub column: String,
    pub alias: Option<String>,
}

impl ColumnSpec {
    pub fn parse(spec: &str) -> Self {
        let (reference, alias) = split_alias(spec.trim());
        let (table, column) = match reference.rsplit_once('.') {
            Some((t, c)) => (Some(t.to_string()), c.to_string()),
            None => (None, reference.to_string()),
        };
        ColumnSpec {
            table,
            column,
            alias: alias.map(str::to_string),
        }
    }

    /// The key this column will have in a result row
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }

    pub(crate) fn expr(&self) -> Expr {
        match (&self.table, self.column.as_str()) {
            (None, "*") => Expr::col(Asterisk),
            (Some(t), "*") => Expr::col((Name::new(t.clone()), Asterisk)),
            (None, c) => Expr::col(Name::new(c)),
            (Some(t), c) => Expr::col((Name::new(t.clone()), Name::new(c))),
        }
    }

    /// Whether `name` refers to this column, either verbatim or by output name
    pub(crate) fn matches(&self, spec: &str, name: &str) -> bool {
        spec == name || self.output_name() == name
    }
}

/// Expression for a column reference, ignoring any alias
pub(crate) fn column_expr(spec: &str) -> Expr {
    ColumnSpec::parse(spec).expr()
}

/// A parsed table reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub alias: Option<String>,
}

impl TableSpec {
    pub fn parse(spec: &str) -> Self {
        let (name, alias) = split_alias(spec.trim());
        TableSpec {
            name: name.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    /// Name used to qualify columns of this table inside the statement
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
