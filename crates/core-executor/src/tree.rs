use crate::error::{self as ex_error, ExecutionResult};
use crate::models::Cell;
use crate::normalize::normalize_row;
use core_utils::RowCursor;
use serde::Serialize;
use snafu::{OptionExt, ResultExt};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: Cell,
    pub text: Cell,
    pub expanded: bool,
    pub leaf: bool,
    /// `None` for leaves, serialized as `null`.
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    #[must_use]
    pub fn root() -> Self {
        Self::group(Cell::Integer(1), Cell::from("root"))
    }

    #[must_use]
    pub const fn group(id: Cell, text: Cell) -> Self {
        Self {
            id,
            text,
            expanded: true,
            leaf: false,
            children: Some(Vec::new()),
        }
    }

    #[must_use]
    pub const fn leaf(id: Cell, text: Cell) -> Self {
        Self {
            id,
            text,
            expanded: false,
            leaf: true,
            children: None,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Appends `child` and returns its index. A leaf turns into a group on its
    /// first child.
    pub fn append_child(&mut self, child: Self) -> usize {
        self.leaf = false;
        let children = self.children.get_or_insert_with(Vec::new);
        children.push(child);
        children.len() - 1
    }
}

/// Result columns the tree is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeColumns {
    pub group_key: String,
    pub group_label: String,
    pub item_id: String,
    pub item_label: String,
}

impl Default for TreeColumns {
    fn default() -> Self {
        Self {
            group_key: "ordPath".to_string(),
            group_label: "menu".to_string(),
            item_id: "id".to_string(),
            item_label: "name".to_string(),
        }
    }
}

impl TreeColumns {
    #[must_use]
    pub fn new(
        group_key: impl Into<String>,
        group_label: impl Into<String>,
        item_id: impl Into<String>,
        item_label: impl Into<String>,
    ) -> Self {
        Self {
            group_key: group_key.into(),
            group_label: group_label.into(),
            item_id: item_id.into(),
            item_label: item_label.into(),
        }
    }

    // Same lookup as a record build: with duplicate names the last column wins.
    fn resolve(&self, columns: &[String]) -> ExecutionResult<[usize; 4]> {
        let find = |name: &str| {
            columns
                .iter()
                .rposition(|column| column == name)
                .context(ex_error::MissingColumnSnafu { name })
        };
        Ok([
            find(&self.group_key)?,
            find(&self.group_label)?,
            find(&self.item_id)?,
            find(&self.item_label)?,
        ])
    }
}

/// Folds rows of (group key, group label, item id, item label) into a
/// two-level tree under a synthetic root.
///
/// Groups are keyed by the text of their label and keep first-seen order.
///
/// # Errors
///
/// Returns `MissingColumn` if one of `columns` is not in the result and
/// `Cursor` if the cursor fails to advance. Rows that fail to scan are
/// skipped.
pub fn assemble_tree(cursor: &mut dyn RowCursor, columns: &TreeColumns) -> ExecutionResult<TreeNode> {
    let [key_idx, label_idx, id_idx, name_idx] = columns.resolve(&cursor.columns())?;

    let mut root = TreeNode::root();
    let mut groups: HashMap<String, usize> = HashMap::new();
    let mut row = 0usize;
    while cursor.advance().context(ex_error::CursorSnafu)? {
        let cells = match cursor.scan() {
            Ok(cells) => normalize_row(cells),
            Err(error) => {
                tracing::warn!(row, %error, "Skipping tree row that failed to scan");
                row += 1;
                continue;
            }
        };
        row += 1;
        let cell = |idx: usize| cells.get(idx).cloned().unwrap_or(Cell::Null);

        let label = cell(label_idx);
        let group_idx = match groups.get(&label.to_string()) {
            Some(idx) => *idx,
            None => {
                let idx = root.append_child(TreeNode::group(cell(key_idx), label.clone()));
                groups.insert(label.to_string(), idx);
                idx
            }
        };
        if let Some(group) = root.children.as_mut().and_then(|c| c.get_mut(group_idx)) {
            group.append_child(TreeNode::leaf(cell(id_idx), cell(name_idx)));
        }
    }
    tracing::debug!(groups = groups.len(), rows = row, "Assembled tree");
    Ok(root)
}
