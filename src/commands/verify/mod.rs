use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{VerifyArgs, default_database_path, default_expectations_path, default_report_path};
use crate::model::{NamedAmount, RecipeDatabase};
use crate::util::{now_utc_string, read_json, write_json_pretty};

mod expectations;
mod run;

pub use expectations::{
    ExpectationManifest, VerificationReport, load_expectations, verify_database,
};
pub use run::run;

use expectations::*;
