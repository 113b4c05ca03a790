use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnRole {
    Device,
    Material,
    Product,
    Time,
}

impl ColumnRole {
    /// Tie-break order when a header matches more than one family.
    pub const PRIORITY: [ColumnRole; 4] = [
        ColumnRole::Device,
        ColumnRole::Material,
        ColumnRole::Product,
        ColumnRole::Time,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Material => "material",
            Self::Product => "product",
            Self::Time => "time",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleFamily {
    pub role: ColumnRole,
    pub keywords: Vec<String>,
}

/// Header vocabulary used for shape detection and column roles.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleKeywords {
    pub families: Vec<RoleFamily>,
    #[serde(default = "default_mode_keywords")]
    pub mode_keywords: Vec<String>,
    #[serde(default = "default_product_keywords")]
    pub product_keywords: Vec<String>,
}

impl Default for RoleKeywords {
    fn default() -> Self {
        Self {
            families: vec![
                RoleFamily {
                    role: ColumnRole::Device,
                    keywords: keywords(&["合成设备", "设备", "device"]),
                },
                RoleFamily {
                    role: ColumnRole::Material,
                    keywords: keywords(&["原料", "需求", "material", "requirement"]),
                },
                RoleFamily {
                    role: ColumnRole::Product,
                    keywords: keywords(&["产物", "产品", "product"]),
                },
                RoleFamily {
                    role: ColumnRole::Time,
                    keywords: keywords(&["时间", "时长", "time", "duration"]),
                },
            ],
            mode_keywords: default_mode_keywords(),
            product_keywords: default_product_keywords(),
        }
    }
}

fn keywords(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn default_mode_keywords() -> Vec<String> {
    keywords(&["模式", "mode"])
}

fn default_product_keywords() -> Vec<String> {
    keywords(&["产物", "产品", "product"])
}

fn contains_any(text: &str, needles: &[String]) -> bool {
    let lowered = text.to_lowercase();
    needles
        .iter()
        .any(|needle| !needle.is_empty() && lowered.contains(&needle.to_lowercase()))
}

impl RoleKeywords {
    /// First role in [`ColumnRole::PRIORITY`] whose family matches `header`.
    pub fn classify(&self, header: &str) -> Option<ColumnRole> {
        ColumnRole::PRIORITY.into_iter().find(|role| {
            self.families
                .iter()
                .filter(|family| family.role == *role)
                .any(|family| contains_any(header, &family.keywords))
        })
    }

    pub fn is_mode_marker(&self, text: &str) -> bool {
        contains_any(text, &self.mode_keywords)
    }

    pub fn is_product_header(&self, text: &str) -> bool {
        contains_any(text, &self.product_keywords)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceColumn {
    /// Header text names the device column.
    Explicit,
    /// First column of a row-header table with no other role.
    Implicit,
}

/// Role assignment for one table. Each column holds at most one role.
#[derive(Debug, Clone, Default)]
pub struct ColumnRoles {
    assignments: Vec<(String, ColumnRole)>,
    device_column: Option<(String, DeviceColumn)>,
}

impl ColumnRoles {
    pub fn role_of(&self, column_id: &str) -> Option<ColumnRole> {
        self.assignments
            .iter()
            .find(|(id, _)| id == column_id)
            .map(|(_, role)| *role)
    }

    pub fn columns_with(&self, role: ColumnRole) -> impl Iterator<Item = &str> {
        self.assignments
            .iter()
            .filter(move |(_, assigned)| *assigned == role)
            .map(|(id, _)| id.as_str())
    }

    pub fn has_role(&self, role: ColumnRole) -> bool {
        self.columns_with(role).next().is_some()
    }

    pub fn device_column(&self) -> Option<(&str, DeviceColumn)> {
        self.device_column
            .as_ref()
            .map(|(id, kind)| (id.as_str(), *kind))
    }

    pub fn has_explicit_device(&self) -> bool {
        matches!(self.device_column, Some((_, DeviceColumn::Explicit)))
    }

    fn assign(&mut self, column_id: &str, role: ColumnRole, device: Option<DeviceColumn>) {
        if self.role_of(column_id).is_some() {
            return;
        }
        self.assignments.push((column_id.to_string(), role));
        if let Some(kind) = device
            && self.device_column.is_none()
        {
            self.device_column = Some((column_id.to_string(), kind));
        }
    }
}

/// Maps each column of a recognized table to at most one role, using the
/// header row the shape dictates.
pub fn map_column_roles(
    tree: &BlockTree,
    table: &TableData,
    shape: &TableShape,
    keywords: &RoleKeywords,
) -> ColumnRoles {
    let mut roles = ColumnRoles::default();
    let Some(header_row_id) = shape
        .header_row_index()
        .and_then(|index| table.row_ids.get(index))
    else {
        return roles;
    };

    for (column_index, column_id) in table.column_ids.iter().enumerate() {
        let header = cell_text(tree, table, header_row_id, column_id).unwrap_or_default();

        match keywords.classify(&header) {
            Some(ColumnRole::Device) => {
                roles.assign(column_id, ColumnRole::Device, Some(DeviceColumn::Explicit));
            }
            Some(role) => {
                debug!(column_id = %column_id, role = role.as_str(), "column role from header");
                roles.assign(column_id, role, None);
            }
            None if column_index == 0 && shape.is_row_header() => {
                roles.assign(column_id, ColumnRole::Device, Some(DeviceColumn::Implicit));
            }
            None => {
                debug!(column_id = %column_id, header = %header, "column has no role");
            }
        }
    }

    roles
}
