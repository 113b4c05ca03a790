use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::{StatusArgs, default_database_path, default_report_path};
use crate::commands::verify::VerificationReport;
use crate::model::{BuildRunManifest, RecipeDatabase};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.data_root.join("manifests");
    let database_path = default_database_path(&args.data_root);
    let report_path = default_report_path(&args.data_root);

    info!(data_root = %args.data_root.display(), "status requested");

    match latest_build_manifest(&manifest_dir)? {
        Some(path) => {
            let manifest: BuildRunManifest = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                updated_at = %manifest.updated_at,
                documents_seen = manifest.counts.documents_seen,
                documents_failed = manifest.counts.documents_failed,
                tables_unrecognized = manifest.counts.tables_unrecognized,
                aggregate_candidates = manifest.counts.aggregate_candidates,
                device_candidates = manifest.counts.device_candidates,
                recipes = manifest.counts.recipes_total,
                warnings = manifest.warnings.len(),
                "loaded latest build manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no build run manifest found"),
    }

    if database_path.exists() {
        let database: RecipeDatabase = read_json(&database_path)?;
        let timed = database
            .recipes
            .values()
            .filter(|record| record.manufacturing_time_seconds.is_some())
            .count();
        info!(
            path = %database_path.display(),
            recipes = database.recipes.len(),
            recipes_with_time = timed,
            material_keys = database.as_materials.len(),
            product_keys = database.as_products.len(),
            devices = database.by_device.len(),
            "recipe database status"
        );
    } else {
        warn!(path = %database_path.display(), "recipe database missing");
    }

    if report_path.exists() {
        let report: VerificationReport = read_json(&report_path)?;
        info!(
            path = %report_path.display(),
            generated_at = %report.generated_at,
            expectations = report.expectations_total,
            passed = report.passed,
            failed = report.failed,
            "verification report status"
        );
    } else {
        warn!(path = %report_path.display(), "verification report missing");
    }

    if let Some(sqlite_path) = &args.sqlite_path {
        if sqlite_path.exists() {
            let conn = Connection::open_with_flags(sqlite_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .with_context(|| format!("failed to open {}", sqlite_path.display()))?;
            for (table, rows) in mirror_row_counts(&conn) {
                match rows {
                    Ok(rows) => info!(path = %sqlite_path.display(), table, rows, "sqlite mirror status"),
                    Err(err) => warn!(
                        path = %sqlite_path.display(),
                        table,
                        error = %format!("{err:#}"),
                        "failed to count sqlite mirror rows"
                    ),
                }
            }
        } else {
            warn!(path = %sqlite_path.display(), "sqlite mirror missing");
        }
    }

    Ok(())
}

/// Build manifests carry a UTC compact stamp, so the lexicographically
/// last one is the newest.
fn latest_build_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;
    let mut manifests = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let is_build_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("build_run_") && name.ends_with(".json"))
            .unwrap_or(false);
        if is_build_manifest {
            manifests.push(path);
        }
    }

    manifests.sort();
    Ok(manifests.pop())
}

const MIRROR_TABLES: [&str; 2] = ["recipes", "recipe_items"];

/// Row count per mirror table. A mirror written by an older schema can
/// lack a table; that surfaces as an error rather than a zero count.
fn mirror_row_counts(conn: &Connection) -> Vec<(&'static str, Result<i64>)> {
    MIRROR_TABLES
        .into_iter()
        .map(|table| {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let count = conn
                .query_row(&sql, [], |row| row.get(0))
                .with_context(|| format!("failed to count rows in {table}"));
            (table, count)
        })
        .collect()
}
