use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "recipedb",
    version,
    about = "Consolidate crafting recipes from wiki block-tree exports into one recipe database"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Build(BuildArgs),
    Verify(VerifyArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub details_dir: Option<PathBuf>,

    #[arg(long)]
    pub item_lookup_path: Option<PathBuf>,

    #[arg(long)]
    pub device_text_map_path: Option<PathBuf>,

    #[arg(long)]
    pub device_allowlist_path: Option<PathBuf>,

    #[arg(long)]
    pub role_keywords_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    #[arg(long)]
    pub expectations_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub database_path: Option<PathBuf>,

    #[arg(long)]
    pub expectations_path: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    /// Exit with an error when any expectation fails.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,
}

pub fn default_database_path(data_root: &Path) -> PathBuf {
    data_root.join("recipe_database.json")
}

pub fn default_expectations_path(data_root: &Path) -> PathBuf {
    data_root.join("manifests").join("expectations.json")
}

pub fn default_report_path(data_root: &Path) -> PathBuf {
    data_root.join("manifests").join("verification_report.json")
}
