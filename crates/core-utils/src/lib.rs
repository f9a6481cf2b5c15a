pub mod config;
pub mod cursor;
pub mod guard;
pub mod params;
pub mod sqlite;

pub use config::DbConfig;
pub use cursor::{CancelHandle, Connection, RawCell, RowCursor, TIMESTAMP_FORMAT};
pub use params::SqlParam;

use snafu::prelude::*;
use std::fmt;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to read config file {path}: {source}"))]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse JSON config {path}: {source}"))]
    ConfigJson {
        path: String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to parse YAML config {path}: {source}"))]
    ConfigYaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unsupported config file format: {path}"))]
    ConfigFormat { path: String },

    #[snafu(display("Failed to open database {database}: {source}"))]
    Open {
        database: String,
        source: rusqlite::Error,
    },

    #[snafu(display("Database connection is closed"))]
    Closed,

    #[snafu(display("Failed to prepare statement: {source}"))]
    Prepare { source: rusqlite::Error },

    #[snafu(display("Failed to execute statement: {source}"))]
    Execute { source: rusqlite::Error },

    #[snafu(display("Failed to fetch next row: {source}"))]
    Step { source: rusqlite::Error },

    #[snafu(display("Failed to read column {index}: {source}"))]
    Decode {
        index: usize,
        source: rusqlite::Error,
    },

    #[snafu(display("Column {index} holds invalid UTF-8 text: {source}"))]
    InvalidText {
        index: usize,
        source: std::str::Utf8Error,
    },

    #[snafu(display("Cursor is not positioned on a row"))]
    NoCurrentRow,

    #[snafu(display("Statement exceeded the {timeout_ms} ms query timeout"))]
    Timeout { timeout_ms: u64 },

    #[snafu(display("Input rejected by SQL guard: {input}"))]
    UnsafeInput { input: String },

    #[snafu(display("Connection returned without visiting the cursor"))]
    NoCursor,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the failure means there is no usable connection at all,
    /// as opposed to a failure of one statement.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Closed)
    }
}

/// Explicitly constructed connection handle.
///
/// A `Db` owns one backend connection. Queries only need `&self`; re-pointing
/// the handle at another database needs `&mut self`, so it can never race a
/// statement that is still being read.
pub struct Db {
    config: DbConfig,
    conn: Option<Box<dyn Connection>>,
}

impl Db {
    /// Opens the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an `Open` error if the backend refuses the connection.
    pub fn connect(config: &DbConfig) -> Result<Self> {
        let conn = sqlite::SqliteConnection::open(config)?;
        tracing::debug!(database = %config.database, "Opened database connection");
        Ok(Self {
            config: config.clone(),
            conn: Some(Box::new(conn)),
        })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an `Open` error if SQLite cannot allocate the database.
    pub fn memory() -> Result<Self> {
        Self::connect(&DbConfig::default())
    }

    /// Wraps an already opened backend connection.
    #[must_use]
    pub fn with_connection(config: DbConfig, conn: Box<dyn Connection>) -> Self {
        Self {
            config,
            conn: Some(conn),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DbConfig {
        &self.config
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Points the handle at another database.
    ///
    /// The new connection is opened first; on failure the current one is kept.
    ///
    /// # Errors
    ///
    /// Returns an `Open` error if the new database cannot be opened.
    pub fn reconnect(&mut self, config: &DbConfig) -> Result<()> {
        let conn = sqlite::SqliteConnection::open(config)?;
        tracing::debug!(
            from = %self.config.database,
            to = %config.database,
            "Re-pointed database connection"
        );
        self.conn = Some(Box::new(conn));
        self.config = config.clone();
        Ok(())
    }

    /// Drops the backend connection. Later calls fail with `Closed`.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!(database = %self.config.database, "Closed database connection");
        }
    }

    fn connection(&self) -> Result<&dyn Connection> {
        self.conn.as_deref().context(ClosedSnafu)
    }

    /// Executes a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after [`Db::close`], or the backend's execution error.
    pub fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<usize> {
        self.connection()?.execute(sql, params)
    }

    /// Runs `sql` and hands its cursor to `f`.
    ///
    /// The cursor only lives for the duration of `f`; it is released on every
    /// exit path, including an early return from inside `f`.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after [`Db::close`], or the backend's prepare/bind
    /// error. Errors raised while reading rows are up to `f` to report.
    pub fn query<R, F>(&self, sql: &str, params: &[SqlParam], f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn RowCursor) -> R,
    {
        let conn = self.connection()?;
        let mut f = Some(f);
        let mut out = None;
        conn.query(sql, params, &mut |cursor: &mut dyn RowCursor| {
            if let Some(f) = f.take() {
                out = Some(f(cursor));
            }
            Ok(())
        })?;
        out.context(NoCursorSnafu)
    }

    /// Handle that aborts the statement currently running on this connection,
    /// callable from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.conn.as_deref().and_then(|conn| conn.cancel_handle())
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}
