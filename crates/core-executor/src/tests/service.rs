use super::utils::menu_executor;
use crate::error::ExecutionError;
use crate::models::Cell;
use core_utils::params;

#[test]
#[allow(clippy::expect_used)]
fn test_fetch_all_normalizes_cells() {
    let executor = menu_executor();
    let records = executor
        .fetch_all(
            "SELECT id, name, menu, created_at, active, icon FROM menu_items ORDER BY id",
            &[],
        )
        .expect("fetch failed");
    assert_eq!(records.len(), 3);

    let first = &records[0];
    assert_eq!(first["id"], Cell::Integer(1));
    assert_eq!(first["created_at"], Cell::from("2024-03-05 13:07:02"));
    assert_eq!(first["active"], Cell::Boolean(true));
    assert_eq!(first["icon"], Cell::from("menu"));

    let last = &records[2];
    assert_eq!(last["created_at"], Cell::Null);
    assert_eq!(last["icon"].to_string(), "NULL");
}

#[test]
#[allow(clippy::expect_used)]
fn test_fetch_all_skips_undecodable_row() {
    let executor = menu_executor();
    let records = executor
        .fetch_all(
            "SELECT 'a' AS v UNION ALL SELECT CAST(x'ff' AS TEXT) UNION ALL SELECT 'c'",
            &[],
        )
        .expect("fetch failed");
    let values: Vec<String> = records.iter().map(|r| r["v"].to_string()).collect();
    assert_eq!(values, ["a", "c"]);
}

#[test]
#[allow(clippy::expect_used)]
fn test_fetch_all_json() {
    let executor = menu_executor();
    let json = executor
        .fetch_all_json(
            "SELECT id, menu, created_at FROM menu_items WHERE id IN (?, ?) ORDER BY id",
            &params![1i64, 3i64],
        )
        .expect("fetch failed");
    assert_eq!(
        json,
        r#"[{"id":1,"menu":"A","created_at":"2024-03-05 13:07:02"},{"id":3,"menu":"B","created_at":null}]"#
    );
}

#[test]
#[allow(clippy::expect_used)]
fn test_fetch_one_lowercases_columns() {
    let executor = menu_executor();
    let record = executor
        .fetch_one("SELECT ordPath, menu FROM menu_items ORDER BY id", &[])
        .expect("fetch failed")
        .expect("expected a row");
    assert_eq!(record["ordpath"], Cell::from("01"));
    assert!(record.get("ordPath").is_none());

    let none = executor
        .fetch_one("SELECT * FROM menu_items WHERE id < 0", &[])
        .expect("fetch failed");
    assert!(none.is_none());
}

#[test]
#[allow(clippy::expect_used)]
fn test_fetch_scalar() {
    let executor = menu_executor();
    let count = executor
        .fetch_scalar("SELECT COUNT(*) FROM menu_items WHERE menu = ?", &params!["A"])
        .expect("fetch failed");
    assert_eq!(count, Some(Cell::Integer(2)));

    let empty = executor
        .fetch_scalar("SELECT name FROM menu_items WHERE id < 0", &[])
        .expect("fetch failed");
    assert_eq!(empty, None);

    let err = executor
        .fetch_scalar("SELECT id, name FROM menu_items", &[])
        .unwrap_err();
    assert!(matches!(err, ExecutionError::ShapeMismatch { .. }));
}

#[test]
#[allow(clippy::expect_used)]
fn test_row_count_and_exists() {
    let executor = menu_executor();
    assert_eq!(
        executor
            .row_count("SELECT n FROM counters WHERE n > 5", &[])
            .expect("count failed"),
        0
    );
    assert_eq!(
        executor
            .row_count("SELECT n FROM counters", &[])
            .expect("count failed"),
        5
    );
    assert!(
        executor
            .exists("SELECT 1 FROM menu_items WHERE name = ?", &params!["z"])
            .expect("exists failed")
    );
    assert!(
        !executor
            .exists("SELECT 1 FROM menu_items WHERE name = ?", &params!["q"])
            .expect("exists failed")
    );
}

#[test]
#[allow(clippy::expect_used)]
fn test_execute_reports_affected_rows() {
    let executor = menu_executor();
    let affected = executor
        .execute("UPDATE counters SET n = n * 10 WHERE n > ?", &params![2i64])
        .expect("execute failed");
    assert_eq!(affected, 3);
    assert_eq!(
        executor
            .fetch_scalar("SELECT MAX(n) FROM counters", &[])
            .expect("fetch failed"),
        Some(Cell::Integer(50))
    );
}

#[test]
fn test_statement_error_is_query_execution() {
    let executor = menu_executor();
    let err = executor
        .fetch_all("SELECT * FROM no_such_table", &[])
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::QueryExecution { ref query, .. } if query == "SELECT * FROM no_such_table"
    ));

    let err = executor.execute("DELETE FROM no_such_table", &[]).unwrap_err();
    assert!(matches!(err, ExecutionError::QueryExecution { .. }));
}

#[test]
fn test_closed_connection_is_unavailable() {
    let mut executor = menu_executor();
    executor.db_mut().close();

    assert!(matches!(
        executor.fetch_all("SELECT 1", &[]),
        Err(ExecutionError::ConnectionUnavailable { .. })
    ));
    assert!(matches!(
        executor.execute("SELECT 1", &[]),
        Err(ExecutionError::ConnectionUnavailable { .. })
    ));
    assert!(matches!(
        executor.row_count("SELECT 1", &[]),
        Err(ExecutionError::ConnectionUnavailable { .. })
    ));
}
