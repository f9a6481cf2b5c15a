use crate::error::{self as ex_error, ExecutionError, ExecutionResult};
use crate::models::BoundRows;
use crate::normalize::normalize;
use chrono::NaiveDateTime;
use core_utils::{RawCell, RowCursor, TIMESTAMP_FORMAT};
use snafu::{ResultExt, ensure};
use std::fmt;

/// Conversion from a raw cell into a bound field's type.
///
/// On failure the offending cell is handed back so the caller can report
/// what it found.
pub trait FromCell: Sized {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell>;
}

impl FromCell for i64 {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        match cell {
            RawCell::Integer(v) => Ok(v),
            RawCell::Boolean(v) => Ok(Self::from(v)),
            RawCell::Text(ref v) => v.trim().parse().map_err(|_| cell),
            other => Err(other),
        }
    }
}

impl FromCell for i32 {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        let fallback = cell.clone();
        i64::from_cell(cell).and_then(|v| Self::try_from(v).map_err(|_| fallback))
    }
}

impl FromCell for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        match cell {
            RawCell::Float(v) => Ok(v),
            RawCell::Integer(v) => Ok(v as Self),
            RawCell::Text(ref v) => v.trim().parse().map_err(|_| cell),
            other => Err(other),
        }
    }
}

impl FromCell for bool {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        match cell {
            RawCell::Boolean(v) => Ok(v),
            RawCell::Integer(v) => Ok(v != 0),
            RawCell::Text(ref v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(cell),
            },
            other => Err(other),
        }
    }
}

/// Any non-null cell binds to a string in its normalized rendering.
impl FromCell for String {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        if cell.is_null() {
            return Err(cell);
        }
        Ok(normalize(cell).to_string())
    }
}

impl FromCell for Vec<u8> {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        match cell {
            RawCell::Bytes(v) => Ok(v.to_vec()),
            RawCell::Text(v) => Ok(v.into_bytes()),
            other => Err(other),
        }
    }
}

impl FromCell for NaiveDateTime {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        match cell {
            RawCell::Timestamp(v) => Ok(v),
            RawCell::TimestampTz(v) => Ok(v.naive_local()),
            RawCell::Text(ref v) => Self::parse_from_str(v, TIMESTAMP_FORMAT).map_err(|_| cell),
            other => Err(other),
        }
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(cell: RawCell) -> Result<Self, RawCell> {
        if cell.is_null() {
            return Ok(None);
        }
        T::from_cell(cell).map(Some)
    }
}

type Setter<T> = Box<dyn Fn(&mut T, RawCell) -> Result<(), (RawCell, &'static str)>>;

struct FieldBinding<T> {
    column: usize,
    set: Setter<T>,
}

/// Ordered list of (result column -> field setter) pairs for a record type.
///
/// ```ignore
/// let binder = Binder::new()
///     .field(0, |m: &mut Menu, v: i64| m.id = v)
///     .field(1, |m: &mut Menu, v: String| m.name = v)
///     .field(2, |m: &mut Menu, v: Option<String>| m.parent = v);
/// ```
pub struct Binder<T> {
    fields: Vec<FieldBinding<T>>,
}

impl<T> Default for Binder<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T> fmt::Debug for Binder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|field| field.column))
            .finish()
    }
}

impl<T> Binder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds result column `column` to the field written by `set`.
    #[must_use]
    pub fn field<V, F>(mut self, column: usize, set: F) -> Self
    where
        V: FromCell,
        F: Fn(&mut T, V) + 'static,
    {
        self.fields.push(FieldBinding {
            column,
            set: Box::new(move |target: &mut T, cell: RawCell| {
                let value = V::from_cell(cell).map_err(|cell| (cell, std::any::type_name::<V>()))?;
                set(target, value);
                Ok(())
            }),
        });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn check_shape(&self, columns: usize) -> ExecutionResult<()> {
        ensure!(
            self.fields.len() == columns,
            ex_error::ShapeMismatchSnafu {
                expected: self.fields.len(),
                actual: columns,
            }
        );
        for (field, binding) in self.fields.iter().enumerate() {
            ensure!(
                binding.column < columns,
                ex_error::BindingOutOfRangeSnafu {
                    field,
                    column: binding.column,
                    columns,
                }
            );
        }
        Ok(())
    }

    /// Overwrites the bound fields of `target` from one row.
    fn bind_row(&self, target: &mut T, cells: &[RawCell]) -> ExecutionResult<()> {
        for binding in &self.fields {
            let cell = cells.get(binding.column).cloned().ok_or(
                ExecutionError::ShapeMismatch {
                    expected: self.fields.len(),
                    actual: cells.len(),
                },
            )?;
            (binding.set)(target, cell).map_err(|(found, target)| {
                ExecutionError::CellConversion {
                    column: binding.column,
                    found: found.kind(),
                    target,
                }
            })?;
        }
        Ok(())
    }
}

/// Binds every row into a copy of `sample`.
///
/// One scratch value is overwritten per row and a clone of it is kept after
/// each row, so the returned records are independent. Binding stops at the
/// first row that fails; the rows bound before it are returned together with
/// the failure.
///
/// # Errors
///
/// Returns `Cursor` if the cursor fails to advance. Row failures are reported
/// through [`BoundRows::failure`].
pub fn bind_all<T: Clone>(
    cursor: &mut dyn RowCursor,
    sample: &T,
    binder: &Binder<T>,
) -> ExecutionResult<BoundRows<T>> {
    // the layout is checked once; a mismatch only fails the call once a row
    // actually arrives
    let mut mismatch = binder.check_shape(cursor.columns().len()).err();
    let mut scratch = sample.clone();
    let mut rows = Vec::new();
    while cursor.advance().context(ex_error::CursorSnafu)? {
        let row = rows.len();
        let bound = match mismatch.take() {
            Some(mismatch) => Err(mismatch),
            None => cursor
                .scan()
                .context(ex_error::RowScanSnafu { row })
                .and_then(|cells| binder.bind_row(&mut scratch, &cells)),
        };
        if let Err(failure) = bound {
            tracing::warn!(row, error = %failure, "Stopped binding rows");
            return Ok(BoundRows {
                rows,
                failure: Some(failure),
            });
        }
        rows.push(scratch.clone());
    }
    Ok(BoundRows {
        rows,
        failure: None,
    })
}

/// Binds the first row into a copy of `sample`; further rows are ignored.
///
/// `Ok(None)` means the result was empty. A row that cannot be bound is an
/// error, never `None`.
///
/// # Errors
///
/// Returns `Cursor`, `RowScan`, `ShapeMismatch`, `BindingOutOfRange` or
/// `CellConversion`.
pub fn bind_one<T: Clone>(
    cursor: &mut dyn RowCursor,
    sample: &T,
    binder: &Binder<T>,
) -> ExecutionResult<Option<T>> {
    let columns = cursor.columns().len();
    if !cursor.advance().context(ex_error::CursorSnafu)? {
        return Ok(None);
    }
    binder.check_shape(columns)?;
    let cells = cursor.scan().context(ex_error::RowScanSnafu { row: 0usize })?;
    let mut record = sample.clone();
    binder.bind_row(&mut record, &cells)?;
    Ok(Some(record))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_from_cell_conversions() {
        assert_eq!(i64::from_cell(RawCell::Text(" 12 ".to_string())), Ok(12));
        assert_eq!(i32::from_cell(RawCell::Integer(7)), Ok(7));
        assert_eq!(
            i32::from_cell(RawCell::Integer(i64::MAX)),
            Err(RawCell::Integer(i64::MAX))
        );
        assert_eq!(f64::from_cell(RawCell::Integer(2)), Ok(2.0));
        assert_eq!(bool::from_cell(RawCell::Text("TRUE".to_string())), Ok(true));
        assert_eq!(bool::from_cell(RawCell::Integer(0)), Ok(false));
        assert_eq!(
            String::from_cell(RawCell::Integer(5)),
            Ok("5".to_string())
        );
        assert_eq!(String::from_cell(RawCell::Null), Err(RawCell::Null));
        assert_eq!(Option::<String>::from_cell(RawCell::Null), Ok(None));
        assert_eq!(
            Vec::<u8>::from_cell(RawCell::Text("ab".to_string())),
            Ok(b"ab".to_vec())
        );
        assert_eq!(
            NaiveDateTime::from_cell(RawCell::Text("2024-03-05 13:07:02".to_string())),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 5)
                .and_then(|d| d.and_hms_opt(13, 7, 2))
                .unwrap())
        );
        assert_eq!(
            i64::from_cell(RawCell::Float(1.5)),
            Err(RawCell::Float(1.5))
        );
    }

    #[derive(Debug, Clone, Default)]
    struct Pair {
        left: i64,
        right: i64,
    }

    fn pair_binder() -> Binder<Pair> {
        Binder::new()
            .field(0, |p: &mut Pair, v: i64| p.left = v)
            .field(1, |p: &mut Pair, v: i64| p.right = v)
    }

    #[test]
    fn test_check_shape() {
        let binder = pair_binder();
        assert_eq!(binder.len(), 2);
        assert!(binder.check_shape(2).is_ok());
        assert!(matches!(
            binder.check_shape(3),
            Err(ExecutionError::ShapeMismatch {
                expected: 2,
                actual: 3
            })
        ));

        let skewed = Binder::new()
            .field(0, |p: &mut Pair, v: i64| p.left = v)
            .field(5, |p: &mut Pair, v: i64| p.right = v);
        assert!(matches!(
            skewed.check_shape(2),
            Err(ExecutionError::BindingOutOfRange {
                field: 1,
                column: 5,
                columns: 2
            })
        ));
    }

    #[test]
    fn test_bind_row_reports_conversion() {
        let binder = pair_binder();
        let mut pair = Pair::default();
        let err = binder
            .bind_row(
                &mut pair,
                &[RawCell::Integer(1), RawCell::Text("two".to_string())],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::CellConversion {
                column: 1,
                found: "text",
                target: "i64"
            }
        ));
        // fields bound before the failure are already written
        assert_eq!(pair.left, 1);
    }
}
