use super::*;

const DEVICE_SUB_TYPE_ID: &str = "5";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Device,
    Material,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemInfo {
    pub name: String,
    #[serde(default, rename = "subTypeID")]
    pub sub_type_id: Option<String>,
}

impl ItemInfo {
    pub fn kind(&self) -> ItemKind {
        if self.sub_type_id.as_deref() == Some(DEVICE_SUB_TYPE_ID) {
            ItemKind::Device
        } else {
            ItemKind::Material
        }
    }
}

/// Read-only id → item table supplied next to the exports.
#[derive(Debug, Clone, Default)]
pub struct ItemLookup {
    items: HashMap<String, ItemInfo>,
}

impl ItemLookup {
    pub fn from_items(items: HashMap<String, ItemInfo>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Display name, or `Unknown(<id>)` when the id is not in the table.
    pub fn display_name(&self, item_id: &str) -> (String, bool) {
        match self.items.get(item_id) {
            Some(info) => (info.name.clone(), true),
            None => (format!("Unknown({item_id})"), false),
        }
    }

    pub fn device_ids(&self) -> HashSet<String> {
        self.items
            .iter()
            .filter(|(_, info)| info.kind() == ItemKind::Device)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Filters numeric device ids picked up from malformed pages.
#[derive(Debug, Clone, Default)]
pub struct DeviceAllowlist {
    ids: HashSet<String>,
}

impl DeviceAllowlist {
    pub fn new(ids: HashSet<String>) -> Self {
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Non-numeric ids always pass; an empty list disables the filter.
    pub fn permits(&self, device_id: &str) -> bool {
        let numeric = !device_id.is_empty() && device_id.chars().all(|ch| ch.is_ascii_digit());
        !numeric || self.ids.is_empty() || self.ids.contains(device_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllowlistEntry {
    item_id: String,
}

pub fn load_item_lookup(path: &Path) -> Result<ItemLookup> {
    let items: HashMap<String, ItemInfo> = read_json(path)?;
    Ok(ItemLookup::from_items(items))
}

pub fn load_device_text_map(path: &Path) -> Result<HashMap<String, String>> {
    let map: HashMap<String, String> = read_json_or_default(path)?;
    Ok(map
        .into_iter()
        .map(|(label, device_id)| (label.trim().to_string(), device_id))
        .collect())
}

/// Loads the allowlist file, falling back to the lookup's device items.
pub fn load_device_allowlist(path: &Path, lookup: &ItemLookup) -> Result<DeviceAllowlist> {
    if !path.exists() {
        let ids = lookup.device_ids();
        info!(
            path = %path.display(),
            devices = ids.len(),
            "device allowlist missing; using device items from lookup"
        );
        return Ok(DeviceAllowlist::new(ids));
    }

    let entries: Vec<AllowlistEntry> = read_json(path)?;
    Ok(DeviceAllowlist::new(
        entries.into_iter().map(|entry| entry.item_id).collect(),
    ))
}

pub fn load_role_keywords(path: &Path) -> Result<RoleKeywords> {
    if !path.exists() {
        debug!(path = %path.display(), "no role keyword override; using built-in table");
        return Ok(RoleKeywords::default());
    }
    read_json(path)
}
