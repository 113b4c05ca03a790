use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use rusqlite::{Connection, params};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cli::{BuildArgs, default_database_path, default_expectations_path, default_report_path};
use crate::commands::inventory::{self, DocumentInventory};
use crate::commands::verify;
use crate::model::{
    BuildCounts, BuildPaths, BuildRunManifest, NamedAmount, Provenance, RecipeDatabase,
    RecipeRecord, SourceDocument,
};
use crate::util::{
    ensure_directory, now_utc_string, read_json, read_json_or_default, sha256_bytes, utc_compact_string,
    write_json_pretty,
};

mod blocks;
mod candidate;
mod cells;
mod consolidate;
mod errors;
mod extract;
mod lookups;
mod merge;
mod roles;
mod rules;
mod run;
mod shape;
mod sqlite_export;
#[cfg(test)]
mod tests;

pub use run::run;

use blocks::*;
use candidate::*;
use cells::*;
use consolidate::*;
use errors::*;
use extract::*;
use lookups::*;
use merge::*;
use roles::*;
use rules::*;
use shape::*;
use sqlite_export::*;
