use crate::error::{self as ex_error, ExecutionResult};
use crate::models::{Cell, ColumnCase, Record};
use crate::normalize::normalize;
use core_utils::{RawCell, RowCursor};
use snafu::{OptionExt, ResultExt, ensure};

pub(crate) fn to_record(columns: &[String], cells: Vec<RawCell>) -> Record {
    let mut record = Record::with_capacity(columns.len());
    // duplicate column names collapse onto one key, last value wins
    for (name, cell) in columns.iter().zip(cells) {
        record.insert(name.clone(), normalize(cell));
    }
    record
}

/// Reads every row into a [`Record`].
///
/// A row that fails to scan is logged and skipped; the remaining rows are
/// still returned.
///
/// # Errors
///
/// Returns `Cursor` if the cursor itself fails to advance.
pub fn materialize_all(cursor: &mut dyn RowCursor) -> ExecutionResult<Vec<Record>> {
    let columns = cursor.columns();
    let mut records = Vec::new();
    let mut row = 0usize;
    while cursor.advance().context(ex_error::CursorSnafu)? {
        match cursor.scan() {
            Ok(cells) => records.push(to_record(&columns, cells)),
            Err(error) => tracing::warn!(row, %error, "Skipping row that failed to scan"),
        }
        row += 1;
    }
    tracing::debug!(rows = records.len(), skipped = row - records.len(), "Materialized rows");
    Ok(records)
}

/// Reads the first row only. Further rows are left unread.
///
/// # Errors
///
/// Returns `Cursor` if the cursor fails to advance and `RowScan` if the first
/// row cannot be decoded.
pub fn materialize_one(
    cursor: &mut dyn RowCursor,
    case: ColumnCase,
) -> ExecutionResult<Option<Record>> {
    let mut columns = cursor.columns();
    case.apply(&mut columns);
    if !cursor.advance().context(ex_error::CursorSnafu)? {
        return Ok(None);
    }
    let cells = cursor.scan().context(ex_error::RowScanSnafu { row: 0usize })?;
    Ok(Some(to_record(&columns, cells)))
}

/// Reads the single column of the first row.
///
/// # Errors
///
/// Returns `ShapeMismatch` unless the result has exactly one column,
/// `Cursor` if the cursor fails to advance and `RowScan` if the row cannot be
/// decoded.
pub fn materialize_scalar(cursor: &mut dyn RowCursor) -> ExecutionResult<Option<Cell>> {
    let columns = cursor.columns().len();
    ensure!(
        columns == 1,
        ex_error::ShapeMismatchSnafu {
            expected: 1usize,
            actual: columns,
        }
    );
    if !cursor.advance().context(ex_error::CursorSnafu)? {
        return Ok(None);
    }
    let cell = cursor
        .scan()
        .context(ex_error::RowScanSnafu { row: 0usize })?
        .into_iter()
        .next()
        .context(ex_error::ShapeMismatchSnafu {
            expected: 1usize,
            actual: 0usize,
        })?;
    Ok(Some(normalize(cell)))
}

/// Counts rows by advancing the cursor; no cell is decoded.
///
/// # Errors
///
/// Returns `Cursor` if the cursor fails to advance.
pub fn count_rows(cursor: &mut dyn RowCursor) -> ExecutionResult<u64> {
    let mut count = 0;
    while cursor.advance().context(ex_error::CursorSnafu)? {
        count += 1;
    }
    Ok(count)
}

/// # Errors
///
/// Returns `Cursor` if the cursor fails to advance.
pub fn has_rows(cursor: &mut dyn RowCursor) -> ExecutionResult<bool> {
    cursor.advance().context(ex_error::CursorSnafu)
}
