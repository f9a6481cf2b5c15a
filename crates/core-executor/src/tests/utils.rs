use crate::service::Executor;
use core_utils::{Db, RawCell, RowCursor};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static MENU_SETUP: &str = include_str!(r"./queries/menu_setup.sql");

mockall::mock! {
    pub Cursor {}

    impl RowCursor for Cursor {
        fn columns(&self) -> Vec<String>;
        fn advance(&mut self) -> core_utils::Result<bool>;
        fn scan(&mut self) -> core_utils::Result<Vec<RawCell>>;
    }
}

/// Error a real cursor raises for a row holding invalid UTF-8 text.
#[allow(clippy::unwrap_used)]
pub fn invalid_text_error(index: usize) -> core_utils::Error {
    let bytes: Vec<u8> = vec![0x61, 0xff];
    core_utils::Error::InvalidText {
        index,
        source: std::str::from_utf8(&bytes).unwrap_err(),
    }
}

/// Cursor that yields `rows` in order. A `None` row fails to scan.
pub fn scripted_cursor(columns: &[&str], rows: Vec<Option<Vec<RawCell>>>) -> MockCursor {
    let names: Vec<String> = columns.iter().map(ToString::to_string).collect();
    let position = Arc::new(AtomicUsize::new(0));
    let mut cursor = MockCursor::new();

    cursor.expect_columns().returning(move || names.clone());

    let total = rows.len();
    let advanced = Arc::clone(&position);
    cursor
        .expect_advance()
        .returning(move || Ok(advanced.fetch_add(1, Ordering::SeqCst) < total));

    cursor.expect_scan().returning(move || {
        let current = position.load(Ordering::SeqCst);
        match current.checked_sub(1).and_then(|idx| rows.get(idx)) {
            Some(Some(cells)) => Ok(cells.clone()),
            Some(None) => Err(invalid_text_error(0)),
            None => Err(core_utils::Error::NoCurrentRow),
        }
    });
    cursor
}

pub fn text(value: &str) -> RawCell {
    RawCell::Text(value.to_string())
}

#[allow(clippy::expect_used)]
pub fn menu_executor() -> Executor {
    let db = Db::memory().expect("Failed to open in-memory database");
    for statement in MENU_SETUP.split(';') {
        if !statement.trim().is_empty() {
            db.execute(statement, &[]).expect("Failed to seed database");
        }
    }
    Executor::new(db)
}
