use crate::models::Cell;
use core_utils::{RawCell, TIMESTAMP_FORMAT};

/// Converts a driver value into its portable form.
///
/// Blobs are read as UTF-8 text, timestamps become fixed-width wall-clock
/// text in their own offset, every other scalar passes through.
#[must_use]
pub fn normalize(cell: RawCell) -> Cell {
    match cell {
        RawCell::Null => Cell::Null,
        RawCell::Bytes(bytes) => Cell::Text(String::from_utf8_lossy(&bytes).into_owned()),
        RawCell::Timestamp(ts) => Cell::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        RawCell::TimestampTz(ts) => Cell::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        RawCell::Integer(v) => Cell::Integer(v),
        RawCell::Float(v) => Cell::Float(v),
        RawCell::Boolean(v) => Cell::Boolean(v),
        RawCell::Text(v) => Cell::Text(v),
    }
}

#[must_use]
pub fn normalize_row(cells: Vec<RawCell>) -> Vec<Cell> {
    cells.into_iter().map(normalize).collect()
}
