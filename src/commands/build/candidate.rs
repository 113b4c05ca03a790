use super::*;

const ZERO_COUNT: &str = "0";
const TEXT_DEVICE_PREFIX: &str = "text_";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemAmount {
    pub item_id: String,
    pub count: String,
}

impl ItemAmount {
    pub fn new(item_id: impl Into<String>, count: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            count: count.into(),
        }
    }
}

/// How the device id of a candidate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOrigin {
    Entry,
    TextOverride,
    TextPlaceholder,
    Owner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeCandidate {
    pub device_id: String,
    pub device_origin: DeviceOrigin,
    pub materials: Vec<ItemAmount>,
    pub products: Vec<ItemAmount>,
    pub manufacturing_time_seconds: Option<u32>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSkip {
    /// Device cell is an entry with count "0": a category header row.
    ZeroCountDevice,
    MissingDevice,
    MissingMaterials,
    MissingProducts,
}

impl RowSkip {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ZeroCountDevice => "zero_count_device",
            Self::MissingDevice => "missing_device",
            Self::MissingMaterials => "missing_materials",
            Self::MissingProducts => "missing_products",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Candidate(RecipeCandidate),
    Skipped(RowSkip),
}

/// Everything a classified table needs to turn data rows into candidates.
pub struct RowContext<'a> {
    pub tree: &'a BlockTree,
    pub table: &'a TableData,
    pub roles: &'a ColumnRoles,
    /// Device owning the page, used when the row names no device itself.
    pub owner_device: Option<&'a str>,
    pub provenance: Provenance,
    pub device_text_map: &'a HashMap<String, String>,
    pub rules: &'a ExtractionRules,
}

pub fn build_candidate(context: &RowContext<'_>, row_id: &str) -> RowOutcome {
    let (device_id, device_origin) = match resolve_device(context, row_id) {
        Ok(device) => device,
        Err(skip) => return RowOutcome::Skipped(skip),
    };

    let materials = collect_entries(context, row_id, ColumnRole::Material);
    let products = collect_entries(context, row_id, ColumnRole::Product);
    let manufacturing_time_seconds = resolve_time(context, row_id);

    // Zero-input rows are only kept when the table has no material column.
    if materials.is_empty() && context.roles.has_role(ColumnRole::Material) {
        return RowOutcome::Skipped(RowSkip::MissingMaterials);
    }
    if products.is_empty() {
        return RowOutcome::Skipped(RowSkip::MissingProducts);
    }

    RowOutcome::Candidate(RecipeCandidate {
        device_id,
        device_origin,
        materials,
        products,
        manufacturing_time_seconds,
        provenance: context.provenance,
    })
}

fn resolve_device(context: &RowContext<'_>, row_id: &str) -> Result<(String, DeviceOrigin), RowSkip> {
    let fragments = context
        .roles
        .device_column()
        .map(|(column_id, _)| resolve_cell(context.tree, context.table, row_id, column_id))
        .unwrap_or_default();

    let zero_count_sentinel = fragments
        .iter()
        .any(|fragment| matches!(fragment, CellFragment::Entry(entry) if entry.count == ZERO_COUNT));
    if zero_count_sentinel {
        return Err(RowSkip::ZeroCountDevice);
    }

    for fragment in &fragments {
        match fragment {
            CellFragment::Entry(entry) if !entry.item_id.is_empty() => {
                return Ok((entry.item_id.clone(), DeviceOrigin::Entry));
            }
            CellFragment::Text(label) => {
                return Ok(match context.device_text_map.get(label) {
                    Some(device_id) => (device_id.clone(), DeviceOrigin::TextOverride),
                    None => (
                        format!("{TEXT_DEVICE_PREFIX}{label}"),
                        DeviceOrigin::TextPlaceholder,
                    ),
                });
            }
            CellFragment::Entry(_) => {}
        }
    }

    context
        .owner_device
        .map(|owner| (owner.to_string(), DeviceOrigin::Owner))
        .ok_or(RowSkip::MissingDevice)
}

fn collect_entries(context: &RowContext<'_>, row_id: &str, role: ColumnRole) -> Vec<ItemAmount> {
    context
        .roles
        .columns_with(role)
        .flat_map(|column_id| resolve_cell(context.tree, context.table, row_id, column_id))
        .filter_map(|fragment| match fragment {
            CellFragment::Entry(entry) if !entry.item_id.is_empty() => Some(entry),
            _ => None,
        })
        .collect()
}

fn resolve_time(context: &RowContext<'_>, row_id: &str) -> Option<u32> {
    let column_id = context.roles.columns_with(ColumnRole::Time).next()?;
    resolve_cell(context.tree, context.table, row_id, column_id)
        .into_iter()
        .find_map(|fragment| match fragment {
            CellFragment::Text(text) => context.rules.parse_time(&text),
            CellFragment::Entry(_) => None,
        })
}
