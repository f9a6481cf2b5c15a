use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExecutionError {
    #[snafu(display("Connection unavailable: {source}"))]
    ConnectionUnavailable { source: core_utils::Error },

    #[snafu(display("Query execution failed: {source}, query: {query}"))]
    QueryExecution {
        source: core_utils::Error,
        query: String,
    },

    #[snafu(display("Failed to advance cursor: {source}"))]
    Cursor { source: core_utils::Error },

    #[snafu(display("Failed to scan row {row}: {source}"))]
    RowScan {
        row: usize,
        source: core_utils::Error,
    },

    #[snafu(display("Result has {actual} columns, expected {expected}"))]
    ShapeMismatch { expected: usize, actual: usize },

    #[snafu(display("Field {field} is bound to column {column}, result has {columns} columns"))]
    BindingOutOfRange {
        field: usize,
        column: usize,
        columns: usize,
    },

    #[snafu(display("Cannot convert column {column} from {found} to {target}"))]
    CellConversion {
        column: usize,
        found: &'static str,
        target: &'static str,
    },

    #[snafu(display("Column {name} not found in result"))]
    MissingColumn { name: String },

    #[snafu(display("Failed to serialize records: {source}"))]
    Serialize { source: serde_json::Error },
}

impl ExecutionError {
    /// Errors scoped to a single row; multi-row reads skip or stop at them
    /// instead of failing the whole call.
    #[must_use]
    pub const fn is_row_scoped(&self) -> bool {
        matches!(
            self,
            Self::RowScan { .. }
                | Self::ShapeMismatch { .. }
                | Self::BindingOutOfRange { .. }
                | Self::CellConversion { .. }
        )
    }

    /// Maps a failure to open a query into the connection/statement split.
    pub(crate) fn from_query(query: &str, source: core_utils::Error) -> Self {
        if source.is_connection_error() {
            Self::ConnectionUnavailable { source }
        } else {
            Self::QueryExecution {
                source,
                query: query.to_string(),
            }
        }
    }
}

pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
