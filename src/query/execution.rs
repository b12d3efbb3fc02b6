//! Running facade queries against the executor.

use super::column::Name;
use super::condition::value_expr;
use super::ModelQuery;
use crate::collection::Collection;
use crate::error::LifeError;
use crate::executor::ExecResult;
use crate::record::Record;
use crate::value::sql::from_sea_values;
use crate::value::{Row, Value};
use sea_query::{Expr, PostgresQueryBuilder, Query};
use serde::Serialize;

/// Prefix of synthetic columns that never become additional columns
const SYNTHETIC_PREFIX: &str = "__";

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: T,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

impl ModelQuery {
    /// Run the SELECT and return raw rows
    pub fn fetch(&self) -> Result<Vec<Row>, LifeError> {
        let (sql, values) = self.select_statement()?.build(PostgresQueryBuilder);
        let params = from_sea_values(&values)?;
        log::debug!("[{}] {}", self.config, sql);
        self.executor.query_all(&sql, &params)
    }

    /// Run the SELECT and convert every row into a record of the target entity
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Query` if no target entity was set with `to_model`.
    pub fn fetch_models(&self) -> Result<Collection, LifeError> {
        let rows = self.fetch()?;
        self.hydrate_all(&rows)
    }

    pub(crate) fn hydrate_all(&self, rows: &[Row]) -> Result<Collection, LifeError> {
        let mut collection = Collection::new();
        for row in rows {
            collection.add(self.hydrate(row)?);
        }
        Ok(collection)
    }

    /// Turn one row into a record of the target entity
    ///
    /// Columns the entity does not declare become additional columns, except
    /// synthetic `__`-prefixed ones. The row's own keys become the visible set.
    pub(crate) fn hydrate(&self, row: &Row) -> Result<Record, LifeError> {
        let entity = self.target.as_ref().ok_or_else(|| {
            LifeError::Query("no target entity set; call to_model first".to_string())
        })?;
        let record = entity.new_record();
        if entity.config().is_empty() {
            record.set_config(&self.config);
        }
        for (name, value) in row {
            if !entity.schema().contains(name) && !name.starts_with(SYNTHETIC_PREFIX) {
                record.set_additional_column(name, value.clone());
            }
        }
        record.set_visible_columns(row.keys());
        record.load_data(row);
        Ok(record)
    }

    /// Page through results `batch_size` rows at a time
    ///
    /// The callback returns `false` to stop early. An existing limit caps the
    /// total number of rows streamed, an existing offset is the starting point.
    pub fn stream<F>(&self, batch_size: u64, mut callback: F) -> Result<(), LifeError>
    where
        F: FnMut(Vec<Row>) -> bool,
    {
        if batch_size == 0 {
            return Err(LifeError::Query("batch size must be positive".to_string()));
        }
        let start = self.offset.unwrap_or(0);
        let mut fetched = 0u64;
        loop {
            let take = match self.limit {
                Some(cap) => batch_size.min(cap.saturating_sub(fetched)),
                None => batch_size,
            };
            if take == 0 {
                break;
            }
            let mut page = self.clone();
            page.limit = Some(take);
            page.offset = Some(start + fetched);
            let rows = page.fetch()?;
            let count = rows.len() as u64;
            if count == 0 {
                break;
            }
            fetched += count;
            if !callback(rows) || count < take {
                break;
            }
        }
        Ok(())
    }

    /// [`ModelQuery::stream`] with each batch converted into a collection
    pub fn stream_models<F>(&self, batch_size: u64, mut callback: F) -> Result<(), LifeError>
    where
        F: FnMut(Collection) -> bool,
    {
        let mut failure = None;
        self.stream(batch_size, |rows| match self.hydrate_all(&rows) {
            Ok(collection) => callback(collection),
            Err(e) => {
                failure = Some(e);
                false
            }
        })?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of rows the query matches, ignoring order, limit and offset
    pub fn count(&self) -> Result<u64, LifeError> {
        let mut inner = self.clone();
        inner.orders.clear();
        inner.weights.clear();
        inner.limit = None;
        inner.offset = None;

        let mut select = Query::select();
        select
            .expr_as(Expr::cust("COUNT(*)"), Name::new("count"))
            .from_subquery(inner.select_statement()?, Name::new("__count"));
        let (sql, values) = select.build(PostgresQueryBuilder);
        let params = from_sea_values(&values)?;
        log::debug!("[{}] {}", self.config, sql);

        let rows = self.executor.query_all(&sql, &params)?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .ok_or_else(|| LifeError::Parse("count query returned no count".to_string()))?;
        Ok(count.max(0) as u64)
    }

    /// One page of raw rows; `page` starts at 1
    pub fn paginate(&self, per_page: u64, page: u64) -> Result<Page<Vec<Row>>, LifeError> {
        let (total, window) = self.page_window(per_page, page)?;
        let items = window.fetch()?;
        Ok(Self::page_of(items, total, per_page, page))
    }

    /// One page of records; `page` starts at 1
    pub fn paginate_models(&self, per_page: u64, page: u64) -> Result<Page<Collection>, LifeError> {
        let (total, window) = self.page_window(per_page, page)?;
        let items = window.fetch_models()?;
        Ok(Self::page_of(items, total, per_page, page))
    }

    fn page_window(&self, per_page: u64, page: u64) -> Result<(u64, ModelQuery), LifeError> {
        if per_page == 0 {
            return Err(LifeError::Query("per_page must be positive".to_string()));
        }
        let total = self.count()?;
        let mut window = self.clone();
        window.limit = Some(per_page);
        window.offset = Some(per_page * (page.max(1) - 1));
        Ok((total, window))
    }

    fn page_of<T>(items: T, total: u64, per_page: u64, page: u64) -> Page<T> {
        Page {
            items,
            total,
            page: page.max(1),
            per_page,
            last_page: total.div_ceil(per_page).max(1),
        }
    }

    /// Insert one row
    pub fn insert(&self, row: &Row) -> Result<ExecResult, LifeError> {
        self.insert_many(std::slice::from_ref(row))
    }

    /// Insert rows sharing the first row's columns
    ///
    /// With an incrementing field set, the statement returns the generated
    /// key and the result carries it as `insert_id`.
    pub fn insert_many(&self, rows: &[Row]) -> Result<ExecResult, LifeError> {
        let table = self.table_or_err()?;
        let Some(first) = rows.first() else {
            return Ok(ExecResult::default());
        };
        let columns: Vec<String> = first.keys().cloned().collect();

        let mut insert = Query::insert();
        insert.into_table(Name::new(table.name.clone()));
        if columns.is_empty() {
            insert.or_default_values();
        } else {
            insert.columns(columns.iter().map(|c| Name::new(c.clone())));
            for row in rows {
                let exprs: Vec<Expr> = columns
                    .iter()
                    .map(|c| value_expr(row.get(c).unwrap_or(&Value::Null)))
                    .collect();
                insert
                    .values(exprs)
                    .map_err(|e| LifeError::Query(e.to_string()))?;
            }
        }
        if let Some(field) = &self.incrementing_field {
            insert.returning_col(Name::new(field.clone()));
        }

        let (sql, values) = insert.build(PostgresQueryBuilder);
        let params = from_sea_values(&values)?;
        log::debug!("[{}] {}", self.config, sql);
        if self.incrementing_field.is_some() {
            self.executor.insert(&sql, &params)
        } else {
            let rows_affected = self.executor.execute(&sql, &params)?;
            Ok(ExecResult::new(rows_affected))
        }
    }

    /// Update rows matching the current predicates
    pub fn update(&self, row: &Row) -> Result<ExecResult, LifeError> {
        let table = self.table_or_err()?;
        if row.is_empty() {
            return Ok(ExecResult::default());
        }
        let mut update = Query::update();
        update.table(Name::new(table.name.clone()));
        for (column, value) in row {
            update.value(Name::new(column.clone()), value_expr(value));
        }
        if let Some(cond) = self.conditions.build() {
            update.cond_where(cond);
        }
        let (sql, values) = update.build(PostgresQueryBuilder);
        let params = from_sea_values(&values)?;
        log::debug!("[{}] {}", self.config, sql);
        let rows_affected = self.executor.execute(&sql, &params)?;
        Ok(ExecResult::new(rows_affected))
    }

    /// Write the rows staged with `values`: an update when predicates are set, an insert otherwise
    pub fn save(&mut self) -> Result<ExecResult, LifeError> {
        let staged = std::mem::take(&mut self.values);
        if self.has_conditions() {
            let mut total = ExecResult::default();
            for row in &staged {
                total.rows_affected += self.update(row)?.rows_affected;
            }
            Ok(total)
        } else {
            self.insert_many(&staged)
        }
    }

    /// Delete rows matching the current predicates
    pub fn delete(&self) -> Result<ExecResult, LifeError> {
        let table = self.table_or_err()?;
        let mut delete = Query::delete();
        delete.from_table(Name::new(table.name.clone()));
        if let Some(cond) = self.conditions.build() {
            delete.cond_where(cond);
        }
        let (sql, values) = delete.build(PostgresQueryBuilder);
        let params = from_sea_values(&values)?;
        log::debug!("[{}] {}", self.config, sql);
        let rows_affected = self.executor.execute(&sql, &params)?;
        Ok(ExecResult::new(rows_affected))
    }

    /// Run hand-written SQL with positional `$n` parameters
    pub fn raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, LifeError> {
        log::debug!("[{}] {}", self.config, sql);
        self.executor.query_all(sql, params)
    }

    pub fn begin_transaction(&self) -> Result<(), LifeError> {
        self.executor.begin()
    }

    pub fn commit(&self) -> Result<(), LifeError> {
        self.executor.commit()
    }

    pub fn rollback(&self) -> Result<(), LifeError> {
        self.executor.rollback()
    }
}
