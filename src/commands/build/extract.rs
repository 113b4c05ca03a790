use super::*;

/// Shared, read-only inputs for extracting candidates from documents.
pub struct ExtractionContext<'a> {
    pub rules: &'a ExtractionRules,
    pub device_text_map: &'a HashMap<String, String>,
    pub allowlist: &'a DeviceAllowlist,
}

#[derive(Debug, Default)]
pub struct DocumentCandidates {
    pub aggregate: Vec<RecipeCandidate>,
    pub device: Vec<RecipeCandidate>,
}

#[derive(Debug, Default, Clone)]
pub struct ExtractionStats {
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
}

impl ExtractionStats {
    fn record_skip(&mut self, skip: RowSkip) {
        match skip {
            RowSkip::ZeroCountDevice => self.rows_zero_count_device += 1,
            RowSkip::MissingDevice => self.rows_missing_device += 1,
            RowSkip::MissingMaterials => self.rows_missing_materials += 1,
            RowSkip::MissingProducts => self.rows_missing_products += 1,
        }
    }
}

/// Walks every table of a document once and routes it to one pass:
/// tables with an explicit device column feed the aggregate pass, all
/// other recognized tables feed the device pass owned by the page's item.
pub fn extract_document(
    document: &ItemDocument,
    context: &ExtractionContext<'_>,
    stats: &mut ExtractionStats,
) -> DocumentCandidates {
    let mut output = DocumentCandidates::default();
    debug!(
        item_id = %document.item_id,
        name = document.name.as_deref().unwrap_or_default(),
        trees = document.trees.len(),
        "extracting document"
    );

    for tree in &document.trees {
        for (table_id, table) in tree.tables() {
            stats.tables_seen += 1;

            let shape = detect_shape(tree, table, &context.rules.keywords);
            match shape {
                TableShape::RowHeader { .. } => stats.tables_row_header += 1,
                TableShape::ColumnHeader => stats.tables_column_header += 1,
                TableShape::Unrecognized => {
                    stats.tables_unrecognized += 1;
                    debug!(item_id = %document.item_id, table_id, "skipping unrecognized table");
                    continue;
                }
            }

            let roles = map_column_roles(tree, table, &shape, &context.rules.keywords);
            let (provenance, owner_device) = if roles.has_explicit_device() {
                (Provenance::AggregateTable, None)
            } else {
                (Provenance::DeviceTable, Some(document.item_id.as_str()))
            };

            let row_context = RowContext {
                tree,
                table,
                roles: &roles,
                owner_device,
                provenance,
                device_text_map: context.device_text_map,
                rules: context.rules,
            };

            let candidates = extract_rows(&row_context, &shape, context.allowlist, stats);
            debug!(
                item_id = %document.item_id,
                table_id,
                shape = shape.label(),
                provenance = provenance.as_str(),
                candidates = candidates.len(),
                "extracted table"
            );

            match provenance {
                Provenance::AggregateTable => output.aggregate.extend(candidates),
                Provenance::DeviceTable => output.device.extend(candidates),
            }
        }
    }

    output
}

fn extract_rows(
    context: &RowContext<'_>,
    shape: &TableShape,
    allowlist: &DeviceAllowlist,
    stats: &mut ExtractionStats,
) -> Vec<RecipeCandidate> {
    let Some(data_start) = shape.data_start() else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for row_id in context.table.row_ids.iter().skip(data_start) {
        stats.rows_seen += 1;

        match build_candidate(context, row_id) {
            RowOutcome::Candidate(candidate) => {
                if !allowlist.permits(&candidate.device_id) {
                    stats.rows_disallowed_device += 1;
                    debug!(device_id = %candidate.device_id, "dropping candidate for unlisted numeric device");
                    continue;
                }
                match candidate.device_origin {
                    DeviceOrigin::TextOverride => stats.rows_text_device_override += 1,
                    DeviceOrigin::TextPlaceholder => stats.rows_text_device_placeholder += 1,
                    DeviceOrigin::Entry | DeviceOrigin::Owner => {}
                }
                candidates.push(candidate);
            }
            RowOutcome::Skipped(skip) => {
                stats.record_skip(skip);
                debug!(row_id = %row_id, reason = skip.as_str(), "skipping row");
            }
        }
    }

    candidates
}
