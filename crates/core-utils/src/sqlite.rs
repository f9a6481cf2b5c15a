use crate::cursor::{CancelHandle, Connection, RawCell, RowCursor};
use crate::{
    DbConfig, DecodeSnafu, Error, ExecuteSnafu, InvalidTextSnafu, NoCurrentRowSnafu, OpenSnafu,
    PrepareSnafu, Result, SqlParam, StepSnafu,
};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use fallible_streaming_iterator::FallibleStreamingIterator;
use rusqlite::types::ValueRef;
use rusqlite::{OpenFlags, Rows, params_from_iter};
use snafu::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// VM instructions between two progress-handler callbacks.
const PROGRESS_STEPS: i32 = 1_000;

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];

/// How a column's declared type changes the decoding of its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Temporal,
    Boolean,
    Plain,
}

impl Affinity {
    fn from_decl_type(decl_type: Option<&str>) -> Self {
        let Some(decl_type) = decl_type else {
            return Self::Plain;
        };
        let decl_type = decl_type.to_ascii_uppercase();
        if decl_type.starts_with("BOOL") {
            Self::Boolean
        } else if decl_type.contains("DATE") || decl_type.contains("TIMESTAMP") {
            Self::Temporal
        } else {
            Self::Plain
        }
    }
}

/// Statement deadline shared with the SQLite progress handler.
#[derive(Default)]
struct Deadline {
    expires_at: Mutex<Option<Instant>>,
    fired: AtomicBool,
}

impl Deadline {
    /// Arms the deadline for one statement and returns the deadline it
    /// replaces. A statement nested inside another never extends the outer
    /// deadline.
    fn arm(&self, timeout: Duration) -> Option<Instant> {
        let mut previous = None;
        if let Ok(mut expires_at) = self.expires_at.lock() {
            previous = *expires_at;
            let expiry = Instant::now() + timeout;
            *expires_at = Some(previous.map_or(expiry, |outer| outer.min(expiry)));
        }
        self.fired.store(false, Ordering::SeqCst);
        previous
    }

    fn restore(&self, previous: Option<Instant>) {
        if let Ok(mut expires_at) = self.expires_at.lock() {
            *expires_at = previous;
        }
    }

    /// Progress-handler body: `true` interrupts the running statement.
    fn check(&self) -> bool {
        let expired = self
            .expires_at
            .lock()
            .ok()
            .and_then(|expires_at| *expires_at)
            .is_some_and(|expires_at| Instant::now() >= expires_at);
        if expired {
            self.fired.store(true, Ordering::SeqCst);
        }
        expired
    }

    fn take_fired(&self) -> bool {
        self.fired.swap(false, Ordering::SeqCst)
    }
}

/// Puts back the enclosing statement's deadline (or none) however the
/// statement finishes.
struct ArmedDeadline<'a> {
    deadline: Option<&'a Deadline>,
    previous: Option<Instant>,
}

impl Drop for ArmedDeadline<'_> {
    fn drop(&mut self) {
        if let Some(deadline) = self.deadline {
            deadline.restore(self.previous);
        }
    }
}

pub struct SqliteConnection {
    inner: rusqlite::Connection,
    query_timeout_ms: Option<u64>,
    deadline: Arc<Deadline>,
}

impl SqliteConnection {
    /// Opens the database named by `config.database` (`:memory:` for a
    /// private in-memory database).
    ///
    /// # Errors
    ///
    /// Returns `Open` if the file cannot be opened or configured.
    pub fn open(config: &DbConfig) -> Result<Self> {
        let database = config.database.clone();
        let inner = if config.is_memory() {
            rusqlite::Connection::open_in_memory()
        } else if config.read_only {
            rusqlite::Connection::open_with_flags(
                &config.database,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        } else {
            rusqlite::Connection::open(&config.database)
        }
        .context(OpenSnafu {
            database: database.clone(),
        })?;

        if let Some(busy_timeout_ms) = config.busy_timeout_ms {
            inner
                .busy_timeout(Duration::from_millis(busy_timeout_ms))
                .context(OpenSnafu {
                    database: database.clone(),
                })?;
        }

        let deadline = Arc::new(Deadline::default());
        if config.query_timeout_ms.is_some() {
            let handler_deadline = deadline.clone();
            inner.progress_handler(PROGRESS_STEPS, Some(move || handler_deadline.check()));
        }

        Ok(Self {
            inner,
            query_timeout_ms: config.query_timeout_ms,
            deadline,
        })
    }

    fn arm_deadline(&self) -> ArmedDeadline<'_> {
        match self.query_timeout_ms {
            Some(timeout_ms) => ArmedDeadline {
                previous: self.deadline.arm(Duration::from_millis(timeout_ms)),
                deadline: Some(&self.deadline),
            },
            None => ArmedDeadline {
                deadline: None,
                previous: None,
            },
        }
    }

    fn timeout_or(&self, err: Error) -> Error {
        timeout_or(&self.deadline, self.query_timeout_ms, err)
    }
}

fn timeout_or(deadline: &Deadline, query_timeout_ms: Option<u64>, err: Error) -> Error {
    match query_timeout_ms {
        Some(timeout_ms) if deadline.take_fired() => Error::Timeout { timeout_ms },
        _ => err,
    }
}

impl Connection for SqliteConnection {
    #[tracing::instrument(name = "SqliteConnection::execute", level = "trace", skip(self, params), err)]
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize> {
        let _armed = self.arm_deadline();
        self.inner
            .execute(sql, params_from_iter(params.iter()))
            .context(ExecuteSnafu)
            .map_err(|err| self.timeout_or(err))
    }

    #[tracing::instrument(name = "SqliteConnection::query", level = "trace", skip(self, params, visit), err)]
    fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
        visit: &mut dyn FnMut(&mut dyn RowCursor) -> Result<()>,
    ) -> Result<()> {
        let _armed = self.arm_deadline();
        let mut stmt = self.inner.prepare(sql).context(PrepareSnafu)?;
        let (columns, affinities): (Vec<String>, Vec<Affinity>) = stmt
            .columns()
            .iter()
            .map(|column| {
                (
                    column.name().to_string(),
                    Affinity::from_decl_type(column.decl_type()),
                )
            })
            .unzip();
        let rows = stmt
            .query(params_from_iter(params.iter()))
            .context(ExecuteSnafu)
            .map_err(|err| self.timeout_or(err))?;
        let mut cursor = SqliteCursor {
            rows,
            columns,
            affinities,
            deadline: &self.deadline,
            query_timeout_ms: self.query_timeout_ms,
        };
        visit(&mut cursor)
    }

    fn cancel_handle(&self) -> Option<CancelHandle> {
        let interrupt = self.inner.get_interrupt_handle();
        Some(CancelHandle::new(move || interrupt.interrupt()))
    }
}

struct SqliteCursor<'stmt> {
    rows: Rows<'stmt>,
    columns: Vec<String>,
    affinities: Vec<Affinity>,
    deadline: &'stmt Deadline,
    query_timeout_ms: Option<u64>,
}

impl RowCursor for SqliteCursor<'_> {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn advance(&mut self) -> Result<bool> {
        self.rows
            .advance()
            .context(StepSnafu)
            .map_err(|err| timeout_or(self.deadline, self.query_timeout_ms, err))?;
        Ok(self.rows.get().is_some())
    }

    fn scan(&mut self) -> Result<Vec<RawCell>> {
        let row = self.rows.get().context(NoCurrentRowSnafu)?;
        self.affinities
            .iter()
            .enumerate()
            .map(|(index, affinity)| {
                let value = row.get_ref(index).context(DecodeSnafu { index })?;
                decode(value, *affinity, index)
            })
            .collect()
    }
}

fn decode(value: ValueRef<'_>, affinity: Affinity, index: usize) -> Result<RawCell> {
    Ok(match value {
        ValueRef::Null => RawCell::Null,
        ValueRef::Integer(v) if affinity == Affinity::Boolean => RawCell::Boolean(v != 0),
        ValueRef::Integer(v) => RawCell::Integer(v),
        ValueRef::Real(v) => RawCell::Float(v),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).context(InvalidTextSnafu { index })?;
            match affinity {
                Affinity::Temporal => {
                    parse_timestamp(text).unwrap_or_else(|| RawCell::Text(text.to_string()))
                }
                Affinity::Boolean | Affinity::Plain => RawCell::Text(text.to_string()),
            }
        }
        ValueRef::Blob(bytes) => RawCell::Bytes(Bytes::copy_from_slice(bytes)),
    })
}

/// SQLite stores temporal values as text; recognise the layouts it and its
/// date functions produce. Anything else stays text.
fn parse_timestamp(text: &str) -> Option<RawCell> {
    let text = text.trim();
    if let Some(ts) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
    {
        return Some(RawCell::TimestampTz(ts));
    }
    if let Some(ts) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(RawCell::Timestamp(ts));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(RawCell::Timestamp)
}
