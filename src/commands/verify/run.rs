use super::*;

pub fn run(args: VerifyArgs) -> Result<()> {
    let database_path = args
        .database_path
        .clone()
        .unwrap_or_else(|| default_database_path(&args.data_root));
    let expectations_path = args
        .expectations_path
        .clone()
        .unwrap_or_else(|| default_expectations_path(&args.data_root));
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| default_report_path(&args.data_root));

    let database: RecipeDatabase = read_json(&database_path)?;
    let Some(manifest) = load_expectations(&expectations_path)? else {
        warn!(path = %expectations_path.display(), "expectations file missing; nothing to verify");
        return Ok(());
    };

    let report = verify_database(&database, &manifest, &database_path.display().to_string());
    write_json_pretty(&report_path, &report)?;

    info!(
        path = %report_path.display(),
        expectations = report.expectations_total,
        passed = report.passed,
        failed = report.failed,
        "verification completed"
    );

    if args.strict && !report.all_passed() {
        bail!(
            "{} of {} expectations failed (see {})",
            report.failed,
            report.expectations_total,
            report_path.display()
        );
    }

    Ok(())
}
