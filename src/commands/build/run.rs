use super::*;

const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone)]
struct BuildPathSet {
    data_root: PathBuf,
    details_dir: PathBuf,
    item_lookup_path: PathBuf,
    device_text_map_path: PathBuf,
    device_allowlist_path: PathBuf,
    role_keywords_path: PathBuf,
    output_path: PathBuf,
    sqlite_path: Option<PathBuf>,
    expectations_path: PathBuf,
    report_path: PathBuf,
    manifest_path: PathBuf,
}

fn resolve_paths(args: &BuildArgs, run_stamp: &str) -> BuildPathSet {
    let root = &args.data_root;
    let or_default =
        |value: &Option<PathBuf>, fallback: PathBuf| value.clone().unwrap_or(fallback);

    BuildPathSet {
        data_root: root.clone(),
        details_dir: or_default(&args.details_dir, root.join("item_details")),
        item_lookup_path: or_default(&args.item_lookup_path, root.join("item_lookup.json")),
        device_text_map_path: or_default(
            &args.device_text_map_path,
            root.join("overrides").join("device_text_map.json"),
        ),
        device_allowlist_path: or_default(&args.device_allowlist_path, root.join("devices.json")),
        role_keywords_path: or_default(
            &args.role_keywords_path,
            root.join("overrides").join("role_keywords.json"),
        ),
        output_path: or_default(&args.output_path, default_database_path(root)),
        sqlite_path: args.sqlite_path.clone(),
        expectations_path: or_default(&args.expectations_path, default_expectations_path(root)),
        report_path: default_report_path(root),
        manifest_path: or_default(
            &args.manifest_path,
            root.join("manifests")
                .join(format!("build_run_{run_stamp}.json")),
        ),
    }
}

pub fn run(args: BuildArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_stamp = utc_compact_string(started_ts);
    let run_id = format!("run-{run_stamp}");
    let paths = resolve_paths(&args, &run_stamp);

    info!(data_root = %paths.data_root.display(), run_id = %run_id, "starting recipe build");

    let lookup = load_item_lookup(&paths.item_lookup_path)?;
    let device_text_map = load_device_text_map(&paths.device_text_map_path)?;
    let allowlist = load_device_allowlist(&paths.device_allowlist_path, &lookup)?;
    let rules = ExtractionRules::new(load_role_keywords(&paths.role_keywords_path)?)?;
    info!(
        items = lookup.len(),
        device_text_labels = device_text_map.len(),
        allowlisted_devices = allowlist.len(),
        "loaded lookup tables"
    );

    let documents = inventory::discover_documents(&paths.details_dir)?;

    let context = ExtractionContext {
        rules: &rules,
        device_text_map: &device_text_map,
        allowlist: &allowlist,
    };
    let mut output = run_pipeline(&documents, &lookup, &context)?;

    write_json_atomic(&paths.output_path, &output.database)?;
    info!(path = %paths.output_path.display(), "wrote recipe database");

    if let Some(sqlite_path) = &paths.sqlite_path {
        export_sqlite(sqlite_path, &output.database, &run_id)?;
        info!(path = %sqlite_path.display(), "wrote sqlite mirror");
    }

    let report = match verify::load_expectations(&paths.expectations_path) {
        Ok(Some(expectations)) => Some(verify::verify_database(
            &output.database,
            &expectations,
            &paths.output_path.display().to_string(),
        )),
        Ok(None) => {
            info!(path = %paths.expectations_path.display(), "no expectations file; skipping verification");
            None
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "skipping verification");
            output
                .warnings
                .push(format!("verification skipped: {err:#}"));
            None
        }
    };

    if let Some(report) = report {
        output.counts.expectations_passed = report.passed;
        output.counts.expectations_failed = report.failed;
        if !report.all_passed() {
            output.warnings.push(format!(
                "{} of {} expectations failed; see {}",
                report.failed,
                report.expectations_total,
                paths.report_path.display()
            ));
        }
        if let Err(err) = write_json_pretty(&paths.report_path, &report) {
            warn!(error = %format!("{err:#}"), "failed to write verification report");
            output
                .warnings
                .push(format!("verification report not written: {err:#}"));
        }
    }

    let manifest = BuildRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_build_command(&args),
        paths: BuildPaths {
            data_root: paths.data_root.display().to_string(),
            details_dir: paths.details_dir.display().to_string(),
            item_lookup_path: paths.item_lookup_path.display().to_string(),
            output_path: paths.output_path.display().to_string(),
            sqlite_path: paths
                .sqlite_path
                .as_ref()
                .map(|path| path.display().to_string()),
            expectations_path: paths.expectations_path.display().to_string(),
            verification_report_path: paths.report_path.display().to_string(),
        },
        counts: output.counts.clone(),
        source_hashes: output.source_hashes,
        warnings: output.warnings,
        notes: vec![
            "Recipes rebuilt from scratch over document files sorted by filename.".to_string(),
            "Aggregate-table candidates are merged before device-table candidates.".to_string(),
        ],
    };
    write_json_pretty(&paths.manifest_path, &manifest)?;

    info!(path = %paths.manifest_path.display(), "wrote build run manifest");
    info!(
        recipes = output.counts.recipes_total,
        devices = output.counts.device_keys,
        documents_failed = output.counts.documents_failed,
        "recipe build completed"
    );

    Ok(())
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub database: RecipeDatabase,
    pub counts: BuildCounts,
    /// SHA-256 of every document that could be read, in processing order.
    pub source_hashes: Vec<SourceDocument>,
    pub warnings: Vec<String>,
}

/// Extracts, merges and consolidates the inventory (already in canonical
/// order) into an integrity-checked database. Unreadable or malformed
/// documents are skipped; the run fails only when nothing at all was
/// extracted.
pub fn run_pipeline(
    inventory: &DocumentInventory,
    lookup: &ItemLookup,
    context: &ExtractionContext<'_>,
) -> Result<PipelineOutput> {
    let mut counts = BuildCounts {
        documents_seen: inventory.total(),
        documents_failed: inventory.rejected.len(),
        ..BuildCounts::default()
    };
    let mut warnings = inventory
        .rejected
        .iter()
        .map(|name| format!("skipped {name}: filename is not valid UTF-8"))
        .collect::<Vec<String>>();
    let mut source_hashes = Vec::with_capacity(inventory.documents.len());
    let mut stats = ExtractionStats::default();
    let mut aggregate = Vec::new();
    let mut device = Vec::new();

    for document_file in &inventory.documents {
        let parsed = fs::read(&document_file.path)
            .with_context(|| format!("failed to read {}", document_file.path.display()))
            .and_then(|raw| {
                source_hashes.push(SourceDocument {
                    filename: document_file.filename.clone(),
                    item_id: document_file.item_id.clone(),
                    sha256: sha256_bytes(&raw),
                });
                parse_item_document(&raw, &document_file.item_id)
            });

        let document = match parsed {
            Ok(document) => document,
            Err(err) => {
                counts.documents_failed += 1;
                warn!(file = %document_file.filename, error = %format!("{err:#}"), "skipping malformed document");
                warnings.push(format!("skipped {}: {err:#}", document_file.filename));
                continue;
            }
        };
        counts.documents_parsed += 1;

        let extracted = extract_document(&document, context, &mut stats);
        aggregate.extend(extracted.aggregate);
        device.extend(extracted.device);
    }

    counts.aggregate_candidates = aggregate.len();
    counts.device_candidates = device.len();
    info!(
        documents = counts.documents_parsed,
        tables = stats.tables_seen,
        aggregate_candidates = counts.aggregate_candidates,
        device_candidates = counts.device_candidates,
        "extraction passes completed"
    );

    let mut merger = RecipeMerger::new();
    merger.offer_all(aggregate);
    merger.offer_all(device);
    counts.merge_replacements = merger.replacements();

    if merger.is_empty() {
        return Err(BuildError::NoRecipes {
            documents: inventory.total(),
        }
        .into());
    }
    info!(
        recipes = merger.len(),
        replacements = counts.merge_replacements,
        "merged candidates"
    );

    let consolidation = consolidate(merger.into_entries(), lookup);
    check_integrity(&consolidation.database)
        .context("recipe database failed integrity check; nothing was written")?;

    apply_extraction_stats(&mut counts, &stats);
    counts.recipes_total = consolidation.database.recipes.len();
    counts.material_keys = consolidation.database.as_materials.len();
    counts.product_keys = consolidation.database.as_products.len();
    counts.device_keys = consolidation.database.by_device.len();
    counts.missing_name_lookups = consolidation.missing_names;
    if consolidation.missing_names > 0 {
        warnings.push(format!(
            "{} name lookups fell back to Unknown(<id>) placeholders",
            consolidation.missing_names
        ));
    }
    Ok(PipelineOutput {
        database: consolidation.database,
        counts,
        source_hashes,
        warnings,
    })
}

fn apply_extraction_stats(counts: &mut BuildCounts, stats: &ExtractionStats) {
    counts.tables_seen = stats.tables_seen;
    counts.tables_row_header = stats.tables_row_header;
    counts.tables_column_header = stats.tables_column_header;
    counts.tables_unrecognized = stats.tables_unrecognized;
    counts.rows_seen = stats.rows_seen;
    counts.rows_zero_count_device = stats.rows_zero_count_device;
    counts.rows_missing_device = stats.rows_missing_device;
    counts.rows_missing_materials = stats.rows_missing_materials;
    counts.rows_missing_products = stats.rows_missing_products;
    counts.rows_disallowed_device = stats.rows_disallowed_device;
    counts.rows_text_device_override = stats.rows_text_device_override;
    counts.rows_text_device_placeholder = stats.rows_text_device_placeholder;
}

/// Writes next to `path` first and renames, so readers never observe a
/// half-written database.
fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let staging = path.with_extension("json.partial");
    write_json_pretty(&staging, value)?;
    fs::rename(&staging, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            path.display()
        )
    })
}

pub(super) fn render_build_command(args: &BuildArgs) -> String {
    let mut command = vec![
        "recipedb".to_string(),
        "build".to_string(),
        "--data-root".to_string(),
        args.data_root.display().to_string(),
    ];

    let optional_paths = [
        ("--details-dir", &args.details_dir),
        ("--item-lookup-path", &args.item_lookup_path),
        ("--device-text-map-path", &args.device_text_map_path),
        ("--device-allowlist-path", &args.device_allowlist_path),
        ("--role-keywords-path", &args.role_keywords_path),
        ("--output-path", &args.output_path),
        ("--sqlite-path", &args.sqlite_path),
        ("--expectations-path", &args.expectations_path),
        ("--manifest-path", &args.manifest_path),
    ];
    for (flag, value) in optional_paths {
        if let Some(path) = value {
            command.push(flag.to_string());
            command.push(path.display().to_string());
        }
    }

    command.join(" ")
}
