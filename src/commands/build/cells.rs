use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellFragment {
    Text(String),
    Entry(ItemAmount),
}

/// Fragments of one table cell in document order; empty when the cell is
/// absent, has no children, or only holds block kinds we don't read.
pub fn resolve_cell(
    tree: &BlockTree,
    table: &TableData,
    row_id: &str,
    column_id: &str,
) -> Vec<CellFragment> {
    let cell_id = TableData::cell_id(row_id, column_id);
    let mut fragments = Vec::new();

    for child in tree.children_of(table, &cell_id) {
        let BlockBody::Text(text) = &child.body else {
            continue;
        };
        for fragment in &text.fragments {
            match fragment {
                InlineFragment::Text(value) => {
                    let value = value.trim();
                    if !value.is_empty() {
                        fragments.push(CellFragment::Text(value.to_string()));
                    }
                }
                InlineFragment::Entry { item_id, count } => {
                    fragments.push(CellFragment::Entry(ItemAmount {
                        item_id: item_id.clone(),
                        count: count.clone(),
                    }));
                }
            }
        }
    }

    fragments
}

/// Text fragments of a cell joined by a space, `None` when there are none.
pub fn cell_text(tree: &BlockTree, table: &TableData, row_id: &str, column_id: &str) -> Option<String> {
    let parts = resolve_cell(tree, table, row_id, column_id)
        .into_iter()
        .filter_map(|fragment| match fragment {
            CellFragment::Text(text) => Some(text),
            CellFragment::Entry(_) => None,
        })
        .collect::<Vec<String>>();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
