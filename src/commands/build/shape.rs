use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableShape {
    /// Row 0 holds a mode label, row 1 the column headers, data from row 2.
    RowHeader { mode_label: String },
    /// Row 0 holds the column headers, data from row 1.
    ColumnHeader,
    Unrecognized,
}

impl TableShape {
    pub fn header_row_index(&self) -> Option<usize> {
        match self {
            Self::RowHeader { .. } => Some(1),
            Self::ColumnHeader => Some(0),
            Self::Unrecognized => None,
        }
    }

    pub fn data_start(&self) -> Option<usize> {
        self.header_row_index().map(|index| index + 1)
    }

    pub fn is_row_header(&self) -> bool {
        matches!(self, Self::RowHeader { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::RowHeader { .. } => "row_header",
            Self::ColumnHeader => "column_header",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Classifies a table from its header cells alone; data rows never
/// influence the outcome.
pub fn detect_shape(tree: &BlockTree, table: &TableData, keywords: &RoleKeywords) -> TableShape {
    if table.row_ids.len() < 2 || table.column_ids.len() < 2 {
        return TableShape::Unrecognized;
    }

    let first_row = &table.row_ids[0];
    if let Some(label) = cell_text(tree, table, first_row, &table.column_ids[0])
        && keywords.is_mode_marker(&label)
    {
        return TableShape::RowHeader { mode_label: label };
    }

    let has_product_header = table.column_ids.iter().any(|column_id| {
        cell_text(tree, table, first_row, column_id)
            .map(|header| keywords.is_product_header(&header))
            .unwrap_or(false)
    });
    if has_product_header {
        return TableShape::ColumnHeader;
    }

    TableShape::Unrecognized
}
