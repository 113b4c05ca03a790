use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// A block-tree document file found under the details directory.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub path: PathBuf,
    pub filename: String,
    /// File stem, used when the envelope carries no item id.
    pub item_id: String,
}

/// Documents to process plus the entries that could not be taken up.
#[derive(Debug, Clone, Default)]
pub struct DocumentInventory {
    pub documents: Vec<DocumentFile>,
    /// Lossy display names of `*.json` entries with non-UTF-8 names.
    pub rejected: Vec<String>,
}

impl DocumentInventory {
    pub fn total(&self) -> usize {
        self.documents.len() + self.rejected.len()
    }
}

/// Lists `*.json` files in `details_dir`, sorted by filename.
///
/// Recipe ids are assigned in first-seen order, so this order is what
/// makes a rebuild reproducible. Only an unreadable directory is an error.
pub fn discover_documents(details_dir: &Path) -> Result<DocumentInventory> {
    let mut inventory = DocumentInventory::default();

    let entries = fs::read_dir(details_dir)
        .with_context(|| format!("failed to read {}", details_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", details_dir.display()))?;
        let path = entry.path();

        let is_file = match entry.file_type() {
            Ok(file_type) => file_type.is_file(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to inspect file type");
                false
            }
        };
        if !is_file {
            continue;
        }

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if !is_json {
            continue;
        }

        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            let lossy_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            warn!(file = %lossy_name, "skipping document with non-UTF-8 filename");
            inventory.rejected.push(lossy_name);
            continue;
        };
        let filename = filename.to_owned();
        let item_id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(ToOwned::to_owned)
            .unwrap_or_default();

        inventory.documents.push(DocumentFile {
            path,
            filename,
            item_id,
        });
    }

    inventory
        .documents
        .sort_by(|a, b| a.filename.cmp(&b.filename));
    inventory.rejected.sort();
    Ok(inventory)
}
