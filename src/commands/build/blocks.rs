use super::*;

/// One wiki item's exported page: a list of block trees (the export's
/// `documentMap` holds one tree per sub-document).
#[derive(Debug)]
pub struct ItemDocument {
    pub item_id: String,
    pub name: Option<String>,
    pub trees: Vec<BlockTree>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: String,
    pub parent_id: Option<String>,
    pub body: BlockBody,
}

#[derive(Debug, Clone)]
pub enum BlockBody {
    Table(TableData),
    Text(TextData),
}

#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub row_ids: Vec<String>,
    pub column_ids: Vec<String>,
    pub cells: HashMap<String, CellEntry>,
}

impl TableData {
    pub fn cell_id(row_id: &str, column_id: &str) -> String {
        format!("{row_id}_{column_id}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct CellEntry {
    /// `None` when the export predates explicit child lists.
    pub child_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct TextData {
    pub fragments: Vec<InlineFragment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineFragment {
    Text(String),
    Entry { item_id: String, count: String },
}

/// Locates the blocks holding a table cell's content.
///
/// Exports come in two vintages: newer ones list `childIds` on each cell,
/// older ones only set `parentId` on the child blocks.
pub trait ChildLinkage: std::fmt::Debug {
    fn resolve_children<'a>(&'a self, table: &'a TableData, cell_id: &str) -> Vec<&'a str>;
}

#[derive(Debug, Default)]
pub struct ChildIdLinkage;

impl ChildLinkage for ChildIdLinkage {
    fn resolve_children<'a>(&'a self, table: &'a TableData, cell_id: &str) -> Vec<&'a str> {
        table
            .cells
            .get(cell_id)
            .and_then(|cell| cell.child_ids.as_ref())
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct ParentScanLinkage {
    children_by_parent: HashMap<String, Vec<String>>,
}

impl ParentScanLinkage {
    fn from_blocks(blocks: &[Block]) -> Self {
        let mut children_by_parent = HashMap::<String, Vec<String>>::new();
        for block in blocks {
            if let Some(parent_id) = &block.parent_id {
                children_by_parent
                    .entry(parent_id.clone())
                    .or_default()
                    .push(block.id.clone());
            }
        }
        Self { children_by_parent }
    }
}

impl ChildLinkage for ParentScanLinkage {
    fn resolve_children<'a>(&'a self, _table: &'a TableData, cell_id: &str) -> Vec<&'a str> {
        self.children_by_parent
            .get(cell_id)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct BlockTree {
    blocks: Vec<Block>,
    positions: HashMap<String, usize>,
    linkage: Box<dyn ChildLinkage>,
}

impl BlockTree {
    pub fn new(blocks: Vec<Block>) -> Self {
        let positions = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (block.id.clone(), index))
            .collect();
        let linkage: Box<dyn ChildLinkage> = if has_explicit_child_ids(&blocks) {
            Box::new(ChildIdLinkage)
        } else {
            Box::new(ParentScanLinkage::from_blocks(&blocks))
        };

        Self {
            blocks,
            positions,
            linkage,
        }
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.positions.get(id).map(|index| &self.blocks[*index])
    }

    /// Table blocks in document order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableData)> {
        self.blocks.iter().filter_map(|block| match &block.body {
            BlockBody::Table(table) => Some((block.id.as_str(), table)),
            BlockBody::Text(_) => None,
        })
    }

    pub fn children_of<'a>(&'a self, table: &'a TableData, cell_id: &str) -> Vec<&'a Block> {
        self.linkage
            .resolve_children(table, cell_id)
            .into_iter()
            .filter_map(|id| self.block(id))
            .collect()
    }
}

/// Capability probe: any table cell carrying a `childIds` field marks the
/// tree as the newer export vintage.
fn has_explicit_child_ids(blocks: &[Block]) -> bool {
    blocks.iter().any(|block| match &block.body {
        BlockBody::Table(table) => table.cells.values().any(|cell| cell.child_ids.is_some()),
        BlockBody::Text(_) => false,
    })
}

#[derive(Debug, Deserialize)]
struct DocumentEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    item: Option<EnvelopeItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeItem {
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    document_map: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    table: Option<RawTable>,
    #[serde(default)]
    text: Option<RawText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTable {
    #[serde(default)]
    row_ids: Vec<String>,
    #[serde(default)]
    column_ids: Vec<String>,
    #[serde(default)]
    cell_map: HashMap<String, RawCell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCell {
    #[serde(default)]
    child_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawText {
    #[serde(default)]
    inline_elements: Vec<RawInline>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum RawInline {
    Text {
        #[serde(default)]
        text: RawInlineText,
    },
    Entry {
        entry: RawEntry,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct RawInlineText {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    count: Option<RawCount>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCount {
    Text(String),
    Number(i64),
}

impl RawCount {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value.trim().to_string(),
            Self::Number(value) => value.to_string(),
        }
    }
}

const DEFAULT_ENTRY_COUNT: &str = "1";

/// Parses one exported item page.
///
/// Errors mean the file is unusable as a whole; unknown block kinds are
/// dropped silently.
pub fn parse_item_document(raw: &[u8], fallback_item_id: &str) -> Result<ItemDocument> {
    let envelope: DocumentEnvelope =
        serde_json::from_slice(raw).context("document is not a valid export envelope")?;
    if envelope.code != 0 {
        bail!("export envelope reports failure code {}", envelope.code);
    }

    let item = envelope
        .data
        .and_then(|data| data.item)
        .context("export envelope has no item payload")?;
    let document = item.document.context("item payload has no document")?;

    let item_id = item
        .item_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| fallback_item_id.to_string());

    let mut trees = Vec::with_capacity(document.document_map.len());
    for (doc_id, sub_document) in document.document_map {
        let Some(block_map) = sub_document.get("blockMap").and_then(Value::as_object) else {
            debug!(item_id = %item_id, doc_id = %doc_id, "sub-document without block map");
            continue;
        };

        let mut blocks = Vec::with_capacity(block_map.len());
        for (block_key, value) in block_map {
            let raw_block: RawBlock = serde_json::from_value(value.clone())
                .with_context(|| format!("malformed block {block_key} in sub-document {doc_id}"))?;
            if let Some(block) = convert_block(block_key, raw_block) {
                blocks.push(block);
            }
        }

        trees.push(BlockTree::new(blocks));
    }

    Ok(ItemDocument {
        item_id,
        name: item.name,
        trees,
    })
}

fn convert_block(block_key: &str, raw: RawBlock) -> Option<Block> {
    let body = match raw.kind.as_str() {
        "table" => BlockBody::Table(convert_table(raw.table?)),
        "text" => BlockBody::Text(convert_text(raw.text?)),
        _ => return None,
    };

    Some(Block {
        id: raw.id.unwrap_or_else(|| block_key.to_string()),
        parent_id: raw.parent_id,
        body,
    })
}

fn convert_table(raw: RawTable) -> TableData {
    TableData {
        row_ids: raw.row_ids,
        column_ids: raw.column_ids,
        cells: raw
            .cell_map
            .into_iter()
            .map(|(cell_id, cell)| {
                (
                    cell_id,
                    CellEntry {
                        child_ids: cell.child_ids,
                    },
                )
            })
            .collect(),
    }
}

fn convert_text(raw: RawText) -> TextData {
    let fragments = raw
        .inline_elements
        .into_iter()
        .filter_map(|element| match element {
            RawInline::Text { text } => Some(InlineFragment::Text(text.text)),
            RawInline::Entry { entry } => Some(InlineFragment::Entry {
                item_id: entry.id.trim().to_string(),
                count: entry
                    .count
                    .map(RawCount::into_string)
                    .unwrap_or_else(|| DEFAULT_ENTRY_COUNT.to_string()),
            }),
            RawInline::Other => None,
        })
        .collect();

    TextData { fragments }
}
