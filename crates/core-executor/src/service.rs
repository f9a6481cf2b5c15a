use crate::binder::{self, Binder};
use crate::error::{self as ex_error, ExecutionError, ExecutionResult};
use crate::materialize;
use crate::models::{BoundRows, Cell, ColumnCase, Record};
use crate::tree::{self, TreeColumns, TreeNode};
use core_utils::{Db, RowCursor, SqlParam};
use indexmap::IndexMap;
use snafu::ResultExt;

/// Caller-facing query operations over one explicitly passed [`Db`] handle.
///
/// Every call issues exactly one statement and fully consumes its cursor
/// before returning.
#[derive(Debug)]
pub struct Executor {
    db: Db,
}

impl Executor {
    #[must_use]
    pub const fn new(db: Db) -> Self {
        Self { db }
    }

    #[must_use]
    pub const fn db(&self) -> &Db {
        &self.db
    }

    /// Mutable access for re-pointing or closing the connection.
    pub const fn db_mut(&mut self) -> &mut Db {
        &mut self.db
    }

    #[must_use]
    pub fn into_inner(self) -> Db {
        self.db
    }

    fn with_cursor<R>(
        &self,
        query: &str,
        params: &[SqlParam],
        f: impl FnOnce(&mut dyn RowCursor) -> ExecutionResult<R>,
    ) -> ExecutionResult<R> {
        self.db
            .query(query, params, f)
            .map_err(|e| ExecutionError::from_query(query, e))?
    }

    /// Every row as a column-name keyed record. Rows that fail to decode are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionUnavailable` or `QueryExecution` if the statement
    /// cannot run, and `Cursor` if reading rows breaks off.
    #[tracing::instrument(name = "Executor::fetch_all", level = "debug", skip(self, params), err)]
    pub fn fetch_all(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<Vec<Record>> {
        self.with_cursor(query, params, materialize::materialize_all)
    }

    /// First row only, with lower-cased column names.
    ///
    /// # Errors
    ///
    /// Same as [`Executor::fetch_all`], plus `RowScan` if the row cannot be
    /// decoded.
    #[tracing::instrument(name = "Executor::fetch_one", level = "debug", skip(self, params), err)]
    pub fn fetch_one(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<Option<Record>> {
        self.with_cursor(query, params, |cursor| {
            materialize::materialize_one(cursor, ColumnCase::Lower)
        })
    }

    /// # Errors
    ///
    /// Returns `ShapeMismatch` unless the result has exactly one column.
    #[tracing::instrument(
        name = "Executor::fetch_scalar",
        level = "debug",
        skip(self, params),
        err
    )]
    pub fn fetch_scalar(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<Option<Cell>> {
        self.with_cursor(query, params, materialize::materialize_scalar)
    }

    /// Number of rows the query returns. No cell is decoded.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionUnavailable`, `QueryExecution` or `Cursor`.
    #[tracing::instrument(name = "Executor::row_count", level = "debug", skip(self, params), err)]
    pub fn row_count(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<u64> {
        self.with_cursor(query, params, materialize::count_rows)
    }

    /// # Errors
    ///
    /// Returns `ConnectionUnavailable`, `QueryExecution` or `Cursor`.
    #[tracing::instrument(name = "Executor::exists", level = "debug", skip(self, params), err)]
    pub fn exists(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<bool> {
        self.with_cursor(query, params, materialize::has_rows)
    }

    /// Runs a statement that returns no rows and reports the affected row
    /// count.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionUnavailable` or `QueryExecution`.
    #[tracing::instrument(name = "Executor::execute", level = "debug", skip(self, params), err)]
    pub fn execute(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<usize> {
        let affected = self
            .db
            .execute(query, params)
            .map_err(|e| ExecutionError::from_query(query, e))?;
        tracing::debug!(affected, "Executed statement");
        Ok(affected)
    }

    /// [`Executor::fetch_all`] rendered as a JSON array of objects. Null
    /// cells are written as JSON `null` rather than the `"NULL"` sentinel.
    ///
    /// # Errors
    ///
    /// Same as [`Executor::fetch_all`], plus `Serialize`.
    #[tracing::instrument(
        name = "Executor::fetch_all_json",
        level = "debug",
        skip(self, params),
        err
    )]
    pub fn fetch_all_json(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<String> {
        let fetched = self.fetch_all(query, params)?;
        let records: Vec<IndexMap<&str, serde_json::Value>> = fetched
            .iter()
            .map(|record| {
                record
                    .iter()
                    .map(|(name, cell)| (name.as_str(), cell.to_json_value()))
                    .collect()
            })
            .collect();
        serde_json::to_string(&records).context(ex_error::SerializeSnafu)
    }

    /// Binds every row into a copy of `sample` through `binder`.
    ///
    /// A row that fails to bind stops the read; inspect
    /// [`BoundRows::failure`] to tell a partial result from a complete one.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionUnavailable`, `QueryExecution` or `Cursor`.
    #[tracing::instrument(
        name = "Executor::bind_all_into",
        level = "debug",
        skip(self, sample, binder, params),
        err
    )]
    pub fn bind_all_into<T: Clone>(
        &self,
        sample: &T,
        binder: &Binder<T>,
        query: &str,
        params: &[SqlParam],
    ) -> ExecutionResult<BoundRows<T>> {
        self.with_cursor(query, params, |cursor| binder::bind_all(cursor, sample, binder))
    }

    /// # Errors
    ///
    /// Returns the statement errors of [`Executor::bind_all_into`], plus the
    /// row failure if the first row cannot be bound.
    #[tracing::instrument(
        name = "Executor::bind_one_into",
        level = "debug",
        skip(self, sample, binder, params),
        err
    )]
    pub fn bind_one_into<T: Clone>(
        &self,
        sample: &T,
        binder: &Binder<T>,
        query: &str,
        params: &[SqlParam],
    ) -> ExecutionResult<Option<T>> {
        self.with_cursor(query, params, |cursor| binder::bind_one(cursor, sample, binder))
    }

    /// Tree over the default `ordPath`, `menu`, `id` and `name` columns.
    ///
    /// # Errors
    ///
    /// Returns the statement errors, or `MissingColumn`.
    #[tracing::instrument(
        name = "Executor::build_menu_tree",
        level = "debug",
        skip(self, params),
        err
    )]
    pub fn build_menu_tree(&self, query: &str, params: &[SqlParam]) -> ExecutionResult<TreeNode> {
        self.build_tree(query, params, &TreeColumns::default())
    }

    /// # Errors
    ///
    /// Returns the statement errors, or `MissingColumn`.
    #[tracing::instrument(name = "Executor::build_tree", level = "debug", skip(self, params), err)]
    pub fn build_tree(
        &self,
        query: &str,
        params: &[SqlParam],
        columns: &TreeColumns,
    ) -> ExecutionResult<TreeNode> {
        self.with_cursor(query, params, |cursor| tree::assemble_tree(cursor, columns))
    }
}
