use crate::{Result, SqlParam};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::fmt;
use std::sync::Arc;

/// Fixed wall-clock rendering shared by timestamp cells and timestamp params.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One cell exactly as the driver produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Null,
    Bytes(Bytes),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl RawCell {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::TimestampTz(_) => "timestamp with offset",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Text(_) => "text",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Forward-only view over the rows of one executed query.
pub trait RowCursor {
    /// Result column names, in select order.
    fn columns(&self) -> Vec<String>;

    /// Moves to the next row. `Ok(false)` once the result is exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Decodes every cell of the current row.
    ///
    /// A failure here is scoped to the current row; the cursor can still
    /// advance past it.
    fn scan(&mut self) -> Result<Vec<RawCell>>;
}

/// Backend seam. Implementations hand the cursor to `visit` exactly once per
/// successfully opened query and release it when `visit` returns.
pub trait Connection: Send {
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize>;

    fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
        visit: &mut dyn FnMut(&mut dyn RowCursor) -> Result<()>,
    ) -> Result<()>;

    fn cancel_handle(&self) -> Option<CancelHandle> {
        None
    }
}

/// Aborts whatever statement the originating connection is running.
#[derive(Clone)]
pub struct CancelHandle(Arc<dyn Fn() + Send + Sync>);

impl CancelHandle {
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(cancel))
    }

    pub fn cancel(&self) {
        (self.0)();
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelHandle")
    }
}
