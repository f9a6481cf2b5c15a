use super::utils::{MockCursor, invalid_text_error, scripted_cursor, text};
use crate::error::ExecutionError;
use crate::materialize::{count_rows, has_rows, materialize_all, materialize_one, materialize_scalar};
use crate::models::{Cell, ColumnCase};
use core_utils::RawCell;

#[test]
#[allow(clippy::expect_used)]
fn test_null_is_kept_as_sentinel() {
    let mut cursor = scripted_cursor(
        &["id", "name"],
        vec![Some(vec![RawCell::Integer(1), RawCell::Null])],
    );
    let records = materialize_all(&mut cursor).expect("materialize failed");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("name"), Some(&Cell::Null));
    assert_eq!(records[0]["name"].to_string(), "NULL");
}

#[test]
#[allow(clippy::expect_used)]
fn test_duplicate_columns_keep_last_value() {
    let mut cursor = scripted_cursor(
        &["id", "id"],
        vec![Some(vec![RawCell::Integer(1), RawCell::Integer(2)])],
    );
    let records = materialize_all(&mut cursor).expect("materialize failed");
    assert_eq!(records[0].len(), 1);
    assert_eq!(records[0]["id"], Cell::Integer(2));
}

#[test]
#[allow(clippy::expect_used)]
fn test_zero_columns_yield_empty_records() {
    let mut cursor = scripted_cursor(&[], vec![Some(vec![]), Some(vec![])]);
    let records = materialize_all(&mut cursor).expect("materialize failed");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.is_empty()));
}

#[test]
#[allow(clippy::expect_used)]
fn test_failing_row_is_skipped() {
    let mut cursor = scripted_cursor(
        &["name"],
        vec![Some(vec![text("a")]), None, Some(vec![text("c")])],
    );
    let records = materialize_all(&mut cursor).expect("materialize failed");
    let names: Vec<String> = records.iter().map(|r| r["name"].to_string()).collect();
    assert_eq!(names, ["a", "c"]);
}

#[test]
fn test_advance_failure_aborts() {
    let mut cursor = MockCursor::new();
    cursor.expect_columns().returning(|| vec!["a".to_string()]);
    cursor
        .expect_advance()
        .times(1)
        .returning(|| Err(core_utils::Error::NoCurrentRow));
    cursor.expect_scan().never();

    let err = materialize_all(&mut cursor).unwrap_err();
    assert!(matches!(err, ExecutionError::Cursor { .. }));
    assert!(!err.is_row_scoped());
}

#[test]
#[allow(clippy::expect_used)]
fn test_one_reads_first_row_with_lowered_columns() {
    let mut cursor = scripted_cursor(
        &["OrdPath", "Menu"],
        vec![Some(vec![text("01"), text("A")]), Some(vec![text("02"), text("B")])],
    );
    let record = materialize_one(&mut cursor, ColumnCase::Lower)
        .expect("materialize failed")
        .expect("expected a row");
    assert_eq!(record.keys().collect::<Vec<_>>(), ["ordpath", "menu"]);
    assert_eq!(record["menu"], Cell::from("A"));

    let mut empty = scripted_cursor(&["a"], vec![]);
    assert!(matches!(materialize_one(&mut empty, ColumnCase::Preserve), Ok(None)));

    let mut broken = scripted_cursor(&["a"], vec![None]);
    assert!(matches!(
        materialize_one(&mut broken, ColumnCase::Preserve),
        Err(ExecutionError::RowScan { row: 0, .. })
    ));
}

#[test]
fn test_scalar_shapes() {
    let mut single = scripted_cursor(&["n"], vec![Some(vec![RawCell::Integer(42)])]);
    assert!(matches!(
        materialize_scalar(&mut single),
        Ok(Some(Cell::Integer(42)))
    ));

    let mut empty = scripted_cursor(&["n"], vec![]);
    assert!(matches!(materialize_scalar(&mut empty), Ok(None)));

    let mut wide = scripted_cursor(&["a", "b"], vec![Some(vec![RawCell::Null, RawCell::Null])]);
    assert!(matches!(
        materialize_scalar(&mut wide),
        Err(ExecutionError::ShapeMismatch {
            expected: 1,
            actual: 2
        })
    ));

    let mut broken = scripted_cursor(&["n"], vec![None]);
    let err = materialize_scalar(&mut broken).unwrap_err();
    assert!(err.is_row_scoped());
    assert_eq!(
        err.to_string(),
        format!("Failed to scan row 0: {}", invalid_text_error(0))
    );
}

fn counting_cursor(rows: usize) -> MockCursor {
    let mut cursor = MockCursor::new();
    let mut remaining = rows;
    cursor.expect_columns().returning(|| vec!["n".to_string()]);
    cursor.expect_advance().times(rows + 1).returning(move || {
        let more = remaining > 0;
        remaining = remaining.saturating_sub(1);
        Ok(more)
    });
    cursor.expect_scan().never();
    cursor
}

#[test]
#[allow(clippy::expect_used)]
fn test_count_rows_never_scans() {
    assert_eq!(count_rows(&mut counting_cursor(0)).expect("count failed"), 0);
    assert_eq!(count_rows(&mut counting_cursor(5)).expect("count failed"), 5);
}

#[test]
fn test_has_rows() {
    let mut cursor = MockCursor::new();
    cursor.expect_advance().times(1).returning(|| Ok(true));
    cursor.expect_scan().never();
    assert!(matches!(has_rows(&mut cursor), Ok(true)));
}
