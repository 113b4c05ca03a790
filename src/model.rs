use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which extraction pass produced a recipe.
///
/// Ordering matters: `DeviceTable` ranks above `AggregateTable` when two
/// candidates for the same fingerprint tie on time presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    AggregateTable,
    DeviceTable,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AggregateTable => "aggregateTable",
            Self::DeviceTable => "deviceTable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedAmount {
    pub item_id: String,
    pub name: String,
    pub count: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRecord {
    pub id: String,
    pub device_id: String,
    pub device_name: String,
    pub materials: Vec<NamedAmount>,
    pub products: Vec<NamedAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturing_time_seconds: Option<u32>,
    pub provenance: Provenance,
}

/// The persisted artifact. Indices are derived from `recipes` and hold no
/// state of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDatabase {
    pub recipes: BTreeMap<String, RecipeRecord>,
    pub as_materials: BTreeMap<String, Vec<String>>,
    pub as_products: BTreeMap<String, Vec<String>>,
    pub by_device: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub filename: String,
    pub item_id: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPaths {
    pub data_root: String,
    pub details_dir: String,
    pub item_lookup_path: String,
    pub output_path: String,
    pub sqlite_path: Option<String>,
    pub expectations_path: String,
    pub verification_report_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCounts {
    pub documents_seen: usize,
    pub documents_parsed: usize,
    pub documents_failed: usize,
    pub tables_seen: usize,
    pub tables_row_header: usize,
    pub tables_column_header: usize,
    pub tables_unrecognized: usize,
    pub rows_seen: usize,
    pub rows_zero_count_device: usize,
    pub rows_missing_device: usize,
    pub rows_missing_materials: usize,
    pub rows_missing_products: usize,
    pub rows_disallowed_device: usize,
    pub rows_text_device_override: usize,
    pub rows_text_device_placeholder: usize,
    pub aggregate_candidates: usize,
    pub device_candidates: usize,
    pub merge_replacements: usize,
    pub recipes_total: usize,
    pub material_keys: usize,
    pub product_keys: usize,
    pub device_keys: usize,
    pub missing_name_lookups: usize,
    pub expectations_passed: usize,
    pub expectations_failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: BuildPaths,
    pub counts: BuildCounts,
    pub source_hashes: Vec<SourceDocument>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
