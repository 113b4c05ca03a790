use super::*;

/// Referential integrity violations found before the database is persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("index {index} entry '{key}' references missing recipe '{recipe_id}'")]
    DanglingIndexEntry {
        index: &'static str,
        key: String,
        recipe_id: String,
    },
    #[error("recipe '{recipe_id}' is not reachable from any index")]
    OrphanRecord { recipe_id: String },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no recipes extracted from {documents} documents; input format may have changed")]
    NoRecipes { documents: usize },
}
