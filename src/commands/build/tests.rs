use serde_json::{Map, json};

use super::*;

#[derive(Clone, Copy)]
enum Linkage {
    ChildIds,
    ParentIds,
}

fn text(value: &str) -> Value {
    json!({ "kind": "text", "text": { "text": value } })
}

fn entry(id: &str, count: &str) -> Value {
    json!({ "kind": "entry", "entry": { "id": id, "showType": "1", "count": count } })
}

/// Table block plus one text block per non-empty cell. `rows[r][c]` holds
/// the inline elements of that cell.
fn table_blocks(table_id: &str, rows: &[Vec<Vec<Value>>], linkage: Linkage) -> Map<String, Value> {
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let row_ids = (0..rows.len())
        .map(|index| format!("{table_id}r{index}"))
        .collect::<Vec<String>>();
    let column_ids = (0..column_count)
        .map(|index| format!("{table_id}c{index}"))
        .collect::<Vec<String>>();

    let mut blocks = Map::new();
    let mut cell_map = Map::new();

    for (row_index, row) in rows.iter().enumerate() {
        for (column_index, inline) in row.iter().enumerate() {
            let cell_id = format!("{}_{}", row_ids[row_index], column_ids[column_index]);
            if inline.is_empty() {
                continue;
            }
            let child_id = format!("{table_id}t{row_index}x{column_index}");
            let mut child = json!({
                "id": child_id,
                "kind": "text",
                "text": { "kind": "paragraph", "inlineElements": inline },
            });
            match linkage {
                Linkage::ChildIds => {
                    cell_map.insert(cell_id, json!({ "childIds": [child_id] }));
                }
                Linkage::ParentIds => {
                    child["parentId"] = json!(cell_id);
                    cell_map.insert(cell_id, json!({}));
                }
            }
            blocks.insert(child_id, child);
        }
    }

    blocks.insert(
        table_id.to_string(),
        json!({
            "id": table_id,
            "kind": "table",
            "table": { "rowIds": row_ids, "columnIds": column_ids, "cellMap": cell_map },
        }),
    );
    blocks
}

fn document_json(item_id: &str, tables: Vec<Map<String, Value>>) -> Value {
    let mut block_map = Map::new();
    block_map.insert(
        "heading".to_string(),
        json!({ "id": "heading", "kind": "horizontalLine" }),
    );
    for table in tables {
        block_map.extend(table);
    }

    json!({
        "code": 0,
        "data": {
            "item": {
                "itemId": item_id,
                "name": format!("item {item_id}"),
                "document": { "documentMap": { "doc-1": { "blockMap": block_map } } },
            }
        }
    })
}

fn parse(value: &Value) -> ItemDocument {
    let raw = serde_json::to_vec(value).expect("fixture should serialize");
    parse_item_document(&raw, "fallback").expect("fixture should parse")
}

fn rules() -> ExtractionRules {
    ExtractionRules::new(RoleKeywords::default()).expect("default rules should compile")
}

fn extract(value: &Value, device_text_map: &HashMap<String, String>) -> (DocumentCandidates, ExtractionStats) {
    let rules = rules();
    let allowlist = DeviceAllowlist::default();
    let context = ExtractionContext {
        rules: &rules,
        device_text_map,
        allowlist: &allowlist,
    };
    let mut stats = ExtractionStats::default();
    let candidates = extract_document(&parse(value), &context, &mut stats);
    (candidates, stats)
}

/// Device page with a row-header table: mode label, headers, one data row.
fn device_page(device_id: &str, time: &str) -> Value {
    let rows = vec![
        vec![vec![text("模式一")], vec![], vec![], vec![]],
        vec![
            vec![],
            vec![text("原料需求")],
            vec![text("制作产物")],
            vec![text("消耗时长")],
        ],
        vec![
            vec![],
            vec![entry("5", "1")],
            vec![entry("9", "2")],
            vec![text(time)],
        ],
    ];
    document_json(device_id, vec![table_blocks("tbl", &rows, Linkage::ChildIds)])
}

/// Product page with an aggregate table naming the device explicitly.
fn product_page(item_id: &str, data_rows: Vec<Vec<Vec<Value>>>, linkage: Linkage) -> Value {
    let mut rows = vec![vec![
        vec![text("合成设备")],
        vec![text("原料需求")],
        vec![text("合成产物")],
    ]];
    rows.extend(data_rows);
    document_json(item_id, vec![table_blocks("agg", &rows, linkage)])
}

fn candidate(
    device_id: &str,
    materials: &[(&str, &str)],
    products: &[(&str, &str)],
    time: Option<u32>,
    provenance: Provenance,
) -> RecipeCandidate {
    let amounts = |pairs: &[(&str, &str)]| {
        pairs
            .iter()
            .map(|(id, count)| ItemAmount::new(*id, *count))
            .collect::<Vec<ItemAmount>>()
    };
    RecipeCandidate {
        device_id: device_id.to_string(),
        device_origin: DeviceOrigin::Entry,
        materials: amounts(materials),
        products: amounts(products),
        manufacturing_time_seconds: time,
        provenance,
    }
}

fn lookup() -> ItemLookup {
    let mut items = HashMap::new();
    for (id, name, sub_type) in [
        ("100", "Assembler", Some("5")),
        ("5", "Iron Ore", Some("6")),
        ("9", "Iron Plate", Some("6")),
    ] {
        items.insert(
            id.to_string(),
            ItemInfo {
                name: name.to_string(),
                sub_type_id: sub_type.map(str::to_string),
            },
        );
    }
    ItemLookup::from_items(items)
}

#[test]
fn parse_time_accepts_only_integer_seconds() {
    let rules = rules();
    assert_eq!(rules.parse_time("3s"), Some(3));
    assert_eq!(rules.parse_time(" 12s "), Some(12));
    assert_eq!(rules.parse_time("abc"), None);
    assert_eq!(rules.parse_time("10"), None);
    assert_eq!(rules.parse_time(""), None);
    assert_eq!(rules.parse_time("1.5s"), None);
}

#[test]
fn fingerprint_ignores_material_and_product_order() {
    let first = candidate(
        "100",
        &[("5", "1"), ("7", "3")],
        &[("9", "2"), ("11", "1")],
        None,
        Provenance::AggregateTable,
    );
    let reordered = candidate(
        "100",
        &[("7", "3"), ("5", "1")],
        &[("11", "1"), ("9", "2")],
        Some(4),
        Provenance::DeviceTable,
    );

    assert_eq!(fingerprint(&first), fingerprint(&reordered));
    assert_eq!(fingerprint(&first), "100|5:1,7:3|11:1,9:2");
}

#[test]
fn fingerprint_distinguishes_counts() {
    let one = candidate("100", &[("5", "1")], &[("9", "2")], None, Provenance::DeviceTable);
    let two = candidate("100", &[("5", "2")], &[("9", "2")], None, Provenance::DeviceTable);
    assert_ne!(fingerprint(&one), fingerprint(&two));
}

#[test]
fn merge_prefers_time_then_device_provenance() {
    let aggregate = candidate("100", &[("5", "1")], &[("9", "2")], None, Provenance::AggregateTable);
    let device = candidate("100", &[("5", "1")], &[("9", "2")], None, Provenance::DeviceTable);
    let timed_aggregate =
        candidate("100", &[("5", "1")], &[("9", "2")], Some(3), Provenance::AggregateTable);

    assert!(should_replace(&aggregate, &device));
    assert!(!should_replace(&device, &aggregate));
    assert!(should_replace(&device, &timed_aggregate));
    // Time presence outranks provenance: a timed aggregate record is not
    // displaced by an untimed device record.
    assert!(!should_replace(&timed_aggregate, &device));
    assert!(!should_replace(&aggregate, &aggregate.clone()));
}

#[test]
fn merge_keeps_first_seen_on_full_tie() {
    let mut merger = RecipeMerger::new();
    let first = candidate("100", &[("5", "1")], &[("9", "2")], Some(3), Provenance::DeviceTable);
    let second = candidate("100", &[("5", "1")], &[("9", "2")], Some(8), Provenance::DeviceTable);

    assert_eq!(merger.offer(first), MergeOutcome::Inserted);
    assert_eq!(merger.offer(second), MergeOutcome::Kept);
    assert_eq!(
        merger
            .get("100|5:1|9:2")
            .and_then(|kept| kept.manufacturing_time_seconds),
        Some(3)
    );
    assert_eq!(merger.replacements(), 0);
}

#[test]
fn merge_is_idempotent_and_order_independent_within_a_tier() {
    let candidates = vec![
        candidate("100", &[("5", "1")], &[("9", "2")], None, Provenance::AggregateTable),
        candidate("100", &[("5", "1")], &[("9", "2")], Some(3), Provenance::AggregateTable),
        candidate("101", &[("6", "1")], &[("9", "1")], None, Provenance::AggregateTable),
    ];

    let mut forward = RecipeMerger::new();
    forward.offer_all(candidates.clone());
    let mut twice = RecipeMerger::new();
    twice.offer_all(candidates.clone());
    twice.offer_all(candidates.clone());
    let mut reversed = RecipeMerger::new();
    reversed.offer_all(candidates.into_iter().rev());

    let mut forward_entries = forward.into_entries();
    let twice_entries = twice.into_entries();
    assert_eq!(forward_entries, twice_entries);

    let mut reversed_entries = reversed.into_entries();
    forward_entries.sort_by(|a, b| a.0.cmp(&b.0));
    reversed_entries.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(forward_entries, reversed_entries);
    assert_eq!(forward_entries[0].1.manufacturing_time_seconds, Some(3));
}

#[test]
fn resolve_cell_supports_child_id_and_parent_id_exports() {
    for linkage in [Linkage::ChildIds, Linkage::ParentIds] {
        let rows = vec![
            vec![vec![text("原料需求")], vec![text("合成产物")]],
            vec![
                vec![entry("5", "1"), text(" plus "), entry("6", "4")],
                vec![entry("9", "2")],
            ],
        ];
        let document = parse(&document_json("9", vec![table_blocks("t", &rows, linkage)]));
        let tree = &document.trees[0];
        let (_, table) = tree.tables().next().expect("table block");

        let fragments = resolve_cell(tree, table, "tr1", "tc0");
        assert_eq!(
            fragments,
            vec![
                CellFragment::Entry(ItemAmount::new("5", "1")),
                CellFragment::Text("plus".to_string()),
                CellFragment::Entry(ItemAmount::new("6", "4")),
            ]
        );
        assert!(resolve_cell(tree, table, "tr1", "missing").is_empty());
        assert_eq!(cell_text(tree, table, "tr0", "tc1").as_deref(), Some("合成产物"));
    }
}

#[test]
fn resolve_cell_ignores_unknown_child_kinds() {
    let raw = json!({
        "code": 0,
        "data": { "item": { "itemId": "9", "document": { "documentMap": { "d": { "blockMap": {
            "t": { "id": "t", "kind": "table", "table": {
                "rowIds": ["r0", "r1"], "columnIds": ["c0", "c1"],
                "cellMap": { "r0_c0": { "childIds": ["img", "txt"] } }
            } },
            "img": { "id": "img", "kind": "image", "image": { "url": "x.png" } },
            "txt": { "id": "txt", "kind": "text", "text": { "inlineElements": [
                { "kind": "text", "text": { "text": "header" } },
                { "kind": "link", "link": { "href": "x" } }
            ] } }
        } } } } } }
    });
    let document = parse(&raw);
    let tree = &document.trees[0];
    let (_, table) = tree.tables().next().expect("table block");

    assert_eq!(
        resolve_cell(tree, table, "r0", "c0"),
        vec![CellFragment::Text("header".to_string())]
    );
}

#[test]
fn parse_item_document_rejects_failed_envelopes() {
    let raw = serde_json::to_vec(&json!({ "code": 404, "data": null })).expect("serialize");
    assert!(parse_item_document(&raw, "1").is_err());
    assert!(parse_item_document(b"{ not json", "1").is_err());
}

#[test]
fn detect_shape_classifies_from_header_cells() {
    let keywords = RoleKeywords::default();

    let row_header = parse(&device_page("100", "3s"));
    let tree = &row_header.trees[0];
    let (_, table) = tree.tables().next().expect("table");
    assert_eq!(
        detect_shape(tree, table, &keywords),
        TableShape::RowHeader {
            mode_label: "模式一".to_string()
        }
    );

    let column_header = parse(&product_page(
        "9",
        vec![vec![vec![entry("100", "1")], vec![entry("5", "1")], vec![entry("9", "2")]]],
        Linkage::ChildIds,
    ));
    let tree = &column_header.trees[0];
    let (_, table) = tree.tables().next().expect("table");
    assert_eq!(detect_shape(tree, table, &keywords), TableShape::ColumnHeader);

    let rows = vec![
        vec![vec![text("名称")], vec![text("说明")]],
        vec![vec![entry("9", "1")], vec![text("合成产物 in a data cell")]],
    ];
    let unrelated = parse(&document_json("9", vec![table_blocks("u", &rows, Linkage::ChildIds)]));
    let tree = &unrelated.trees[0];
    let (_, table) = tree.tables().next().expect("table");
    assert_eq!(detect_shape(tree, table, &keywords), TableShape::Unrecognized);
}

#[test]
fn classify_uses_fixed_priority_for_ambiguous_headers() {
    let keywords = RoleKeywords::default();
    assert_eq!(keywords.classify("合成设备"), Some(ColumnRole::Device));
    assert_eq!(keywords.classify("设备产物"), Some(ColumnRole::Device));
    assert_eq!(keywords.classify("原料产物"), Some(ColumnRole::Material));
    assert_eq!(keywords.classify("Product time"), Some(ColumnRole::Product));
    assert_eq!(keywords.classify("消耗时长"), Some(ColumnRole::Time));
    assert_eq!(keywords.classify("备注"), None);
}

#[test]
fn role_priority_does_not_depend_on_family_order_in_config() {
    let keywords: RoleKeywords = serde_json::from_value(json!({
        "families": [
            { "role": "time", "keywords": ["time"] },
            { "role": "product", "keywords": ["output"] },
            { "role": "material", "keywords": ["input"] }
        ]
    }))
    .expect("keyword override should parse");

    assert_eq!(keywords.classify("input time"), Some(ColumnRole::Material));
    assert_eq!(keywords.mode_keywords, vec!["模式", "mode"]);
}

#[test]
fn column_roles_are_exclusive() {
    let rows = vec![
        vec![
            vec![text("合成设备 / 产物")],
            vec![text("原料需求")],
            vec![text("合成产物")],
            vec![text("备注")],
        ],
        vec![vec![], vec![], vec![], vec![]],
    ];
    let document = parse(&document_json("9", vec![table_blocks("x", &rows, Linkage::ChildIds)]));
    let tree = &document.trees[0];
    let (_, table) = tree.tables().next().expect("table");
    let keywords = RoleKeywords::default();
    let shape = detect_shape(tree, table, &keywords);
    let roles = map_column_roles(tree, table, &shape, &keywords);

    assert_eq!(roles.role_of("xc0"), Some(ColumnRole::Device));
    assert_eq!(roles.role_of("xc1"), Some(ColumnRole::Material));
    assert_eq!(roles.role_of("xc2"), Some(ColumnRole::Product));
    assert_eq!(roles.role_of("xc3"), None);
    assert!(roles.has_explicit_device());
    for role in ColumnRole::PRIORITY {
        for column in roles.columns_with(role) {
            assert_eq!(roles.role_of(column), Some(role));
        }
    }
}

#[test]
fn row_header_table_yields_device_candidate_with_time() {
    let (candidates, stats) = extract(&device_page("100", "3s"), &HashMap::new());

    assert!(candidates.aggregate.is_empty());
    assert_eq!(
        candidates.device,
        vec![RecipeCandidate {
            device_origin: DeviceOrigin::Owner,
            ..candidate("100", &[("5", "1")], &[("9", "2")], Some(3), Provenance::DeviceTable)
        }]
    );
    assert_eq!(stats.tables_row_header, 1);
    assert_eq!(stats.rows_seen, 1);
}

#[test]
fn unparseable_time_leaves_time_unknown() {
    let (candidates, _) = extract(&device_page("100", "fast"), &HashMap::new());
    assert_eq!(candidates.device.len(), 1);
    assert_eq!(candidates.device[0].manufacturing_time_seconds, None);
}

#[test]
fn zero_count_device_row_never_produces_a_candidate() {
    let rows = vec![
        vec![vec![entry("100", "0")], vec![entry("5", "1")], vec![entry("9", "2")]],
        vec![vec![entry("100", "1")], vec![entry("5", "1")], vec![entry("9", "2")]],
    ];
    let (candidates, stats) = extract(&product_page("9", rows, Linkage::ParentIds), &HashMap::new());

    assert_eq!(stats.rows_zero_count_device, 1);
    assert_eq!(candidates.aggregate.len(), 1);
    assert_eq!(candidates.aggregate[0].device_id, "100");
    assert_eq!(candidates.aggregate[0].provenance, Provenance::AggregateTable);
}

#[test]
fn text_device_cells_use_override_or_placeholder() {
    let rows = vec![
        vec![vec![text("Hand Crafting")], vec![entry("5", "1")], vec![entry("9", "1")]],
        vec![vec![text("Old Furnace")], vec![entry("5", "2")], vec![entry("9", "1")]],
    ];
    let mut overrides = HashMap::new();
    overrides.insert("Hand Crafting".to_string(), "hand".to_string());

    let (candidates, stats) = extract(&product_page("9", rows, Linkage::ChildIds), &overrides);

    assert_eq!(candidates.aggregate.len(), 2);
    assert_eq!(candidates.aggregate[0].device_id, "hand");
    assert_eq!(candidates.aggregate[0].device_origin, DeviceOrigin::TextOverride);
    assert_eq!(candidates.aggregate[1].device_id, "text_Old Furnace");
    assert_eq!(candidates.aggregate[1].device_origin, DeviceOrigin::TextPlaceholder);
    assert_eq!(stats.rows_text_device_override, 1);
    assert_eq!(stats.rows_text_device_placeholder, 1);
}

#[test]
fn rows_without_materials_or_products_are_discarded() {
    let rows = vec![
        vec![vec![entry("100", "1")], vec![], vec![entry("9", "1")]],
        vec![vec![entry("100", "1")], vec![entry("5", "1")], vec![]],
        vec![vec![], vec![entry("5", "1")], vec![entry("9", "1")]],
    ];
    let (candidates, stats) = extract(&product_page("9", rows, Linkage::ChildIds), &HashMap::new());

    assert!(candidates.aggregate.is_empty());
    assert_eq!(stats.rows_missing_materials, 1);
    assert_eq!(stats.rows_missing_products, 1);
    assert_eq!(stats.rows_missing_device, 1);
}

#[test]
fn tables_without_material_column_allow_zero_input_recipes() {
    let rows = vec![
        vec![vec![text("产物")], vec![text("时间")]],
        vec![vec![entry("31", "1")], vec![text("60s")]],
    ];
    let value = document_json("174", vec![table_blocks("g", &rows, Linkage::ChildIds)]);
    let (candidates, _) = extract(&value, &HashMap::new());

    assert_eq!(candidates.device.len(), 1);
    let generated = &candidates.device[0];
    assert_eq!(generated.device_id, "174");
    assert!(generated.materials.is_empty());
    assert_eq!(generated.products, vec![ItemAmount::new("31", "1")]);
    assert_eq!(generated.manufacturing_time_seconds, Some(60));
}

#[test]
fn allowlist_filters_only_unlisted_numeric_devices() {
    let allowlist = DeviceAllowlist::new(["100".to_string()].into_iter().collect());
    assert!(allowlist.permits("100"));
    assert!(!allowlist.permits("4242"));
    assert!(allowlist.permits("text_Old Furnace"));
    assert!(allowlist.permits("hand"));
    assert!(DeviceAllowlist::default().permits("4242"));
}

#[test]
fn consolidate_assigns_dense_ids_and_placeholder_names() {
    let mut merger = RecipeMerger::new();
    merger.offer(candidate("100", &[("5", "1")], &[("9", "2")], Some(3), Provenance::DeviceTable));
    merger.offer(candidate("777", &[("5", "1"), ("5", "1")], &[("404", "1")], None, Provenance::AggregateTable));

    let consolidation = consolidate(merger.into_entries(), &lookup());
    let database = &consolidation.database;

    let first = &database.recipes["recipe_0"];
    assert_eq!(first.device_name, "Assembler");
    assert_eq!(first.materials[0].name, "Iron Ore");
    assert_eq!(first.manufacturing_time_seconds, Some(3));

    let second = &database.recipes["recipe_1"];
    assert_eq!(second.device_name, "Unknown(777)");
    assert_eq!(second.products[0].name, "Unknown(404)");
    assert_eq!(consolidation.missing_names, 2);

    assert_eq!(database.as_materials["5"], vec!["recipe_0", "recipe_1"]);
    assert_eq!(database.by_device["777"], vec!["recipe_1"]);
    assert!(check_integrity(database).is_ok());
}

#[test]
fn index_lists_follow_numeric_recipe_order() {
    let mut merger = RecipeMerger::new();
    for index in 0..12 {
        let count = index.to_string();
        merger.offer(candidate(
            "100",
            &[("5", count.as_str())],
            &[("9", "1")],
            None,
            Provenance::DeviceTable,
        ));
    }
    let database = consolidate(merger.into_entries(), &lookup()).database;

    let expected = (0..12)
        .map(|index| format!("recipe_{index}"))
        .collect::<Vec<String>>();
    assert_eq!(database.by_device["100"], expected);
}

#[test]
fn integrity_check_rejects_dangling_index_entries_and_orphans() {
    let mut merger = RecipeMerger::new();
    merger.offer(candidate("100", &[("5", "1")], &[("9", "2")], None, Provenance::DeviceTable));
    let database = consolidate(merger.into_entries(), &lookup()).database;

    let mut dangling = database.clone();
    dangling
        .as_products
        .entry("9".to_string())
        .or_default()
        .push("recipe_99".to_string());
    assert_eq!(
        check_integrity(&dangling),
        Err(IntegrityError::DanglingIndexEntry {
            index: "asProducts",
            key: "9".to_string(),
            recipe_id: "recipe_99".to_string(),
        })
    );

    let mut orphaned = database.clone();
    let mut extra = orphaned.recipes["recipe_0"].clone();
    extra.id = "recipe_1".to_string();
    orphaned.recipes.insert(extra.id.clone(), extra);
    assert_eq!(
        check_integrity(&orphaned),
        Err(IntegrityError::OrphanRecord {
            recipe_id: "recipe_1".to_string()
        })
    );
}

fn write_document(dir: &Path, filename: &str, value: &Value) {
    fs::write(
        dir.join(filename),
        serde_json::to_vec_pretty(value).expect("serialize fixture"),
    )
    .expect("write fixture");
}

fn run_fixture_pipeline(details_dir: &Path) -> Result<run::PipelineOutput> {
    let rules = rules();
    let device_text_map = HashMap::new();
    let allowlist = DeviceAllowlist::new(["100".to_string()].into_iter().collect());
    let context = ExtractionContext {
        rules: &rules,
        device_text_map: &device_text_map,
        allowlist: &allowlist,
    };
    let documents = inventory::discover_documents(details_dir)?;
    run::run_pipeline(&documents, &lookup(), &context)
}

#[test]
fn timed_device_candidate_wins_merge_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_document(dir.path(), "100.json", &device_page("100", "3s"));
    write_document(
        dir.path(),
        "9.json",
        &product_page(
            "9",
            vec![vec![vec![entry("100", "1")], vec![entry("5", "1")], vec![entry("9", "2")]]],
            Linkage::ParentIds,
        ),
    );

    let output = run_fixture_pipeline(dir.path()).expect("pipeline should succeed");
    let database = &output.database;

    assert_eq!(database.recipes.len(), 1);
    let record = &database.recipes["recipe_0"];
    assert_eq!(record.device_id, "100");
    assert_eq!(record.manufacturing_time_seconds, Some(3));
    assert_eq!(record.provenance, Provenance::DeviceTable);
    assert_eq!(database.by_device["100"], vec!["recipe_0"]);
    assert_eq!(database.as_materials["5"], vec!["recipe_0"]);
    assert_eq!(database.as_products["9"], vec!["recipe_0"]);
    assert_eq!(output.counts.aggregate_candidates, 1);
    assert_eq!(output.counts.device_candidates, 1);
    assert_eq!(output.counts.merge_replacements, 1);
}

#[test]
fn pipeline_skips_malformed_documents_and_unlisted_devices() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_document(dir.path(), "100.json", &device_page("100", "3s"));
    write_document(dir.path(), "4242.json", &device_page("4242", "5s"));
    fs::write(dir.path().join("500.json"), b"{ truncated").expect("write broken fixture");
    fs::write(dir.path().join("notes.txt"), b"ignored").expect("write non-json file");

    let output = run_fixture_pipeline(dir.path()).expect("pipeline should succeed");

    assert_eq!(output.counts.documents_seen, 3);
    assert_eq!(output.counts.documents_failed, 1);
    assert_eq!(output.counts.rows_disallowed_device, 1);
    assert_eq!(output.database.recipes.len(), 1);
    assert!(output.warnings.iter().any(|warning| warning.contains("500.json")));
}

#[test]
fn pipeline_fails_loudly_when_nothing_is_extracted() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("1.json"), b"[]").expect("write fixture");

    let err = run_fixture_pipeline(dir.path()).expect_err("empty run must fail");
    assert!(err.downcast_ref::<BuildError>().is_some());
}

#[test]
fn build_command_writes_database_manifest_mirror_and_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let details = root.join("item_details");
    fs::create_dir_all(&details).expect("details dir");
    write_document(&details, "100.json", &device_page("100", "3s"));
    write_json_pretty(
        &root.join("item_lookup.json"),
        &json!({
            "100": { "name": "Assembler", "subTypeID": "5" },
            "5": { "name": "Iron Ore", "subTypeID": "6" }
        }),
    )
    .expect("write lookup");
    write_json_pretty(
        &default_expectations_path(root),
        &json!({ "expectations": [
            { "deviceId": "100", "requiredMaterials": [{ "itemId": "5", "count": 1 }],
              "requiredProducts": [{ "itemId": "9", "count": "2" }] },
            { "deviceId": "100", "requiredMaterials": [], "requiredProducts": [{ "itemId": "9", "count": "1" }] }
        ] }),
    )
    .expect("write expectations");

    let args = BuildArgs {
        data_root: root.to_path_buf(),
        details_dir: None,
        item_lookup_path: None,
        device_text_map_path: None,
        device_allowlist_path: None,
        role_keywords_path: None,
        output_path: None,
        sqlite_path: Some(root.join("recipes.sqlite")),
        expectations_path: None,
        manifest_path: Some(root.join("manifests").join("build.json")),
    };
    run(args).expect("build should succeed");

    let database: RecipeDatabase = read_json(&default_database_path(root)).expect("database");
    assert_eq!(database.recipes["recipe_0"].products[0].name, "Unknown(9)");

    let manifest: BuildRunManifest =
        read_json(&root.join("manifests").join("build.json")).expect("manifest");
    assert_eq!(manifest.counts.recipes_total, 1);
    assert_eq!(manifest.counts.expectations_passed, 1);
    assert_eq!(manifest.counts.expectations_failed, 1);
    assert_eq!(manifest.source_hashes.len(), 1);
    assert_eq!(manifest.source_hashes[0].sha256.len(), 64);

    let report: verify::VerificationReport =
        read_json(&default_report_path(root)).expect("report");
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed, 1);

    let connection = Connection::open(root.join("recipes.sqlite")).expect("open mirror");
    let items: i64 = connection
        .query_row("SELECT COUNT(*) FROM recipe_items", [], |row| row.get(0))
        .expect("count items");
    assert_eq!(items, 2);
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_filename_is_skipped_not_fatal() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().expect("tempdir");
    write_document(dir.path(), "100.json", &device_page("100", "3s"));
    fs::write(
        dir.path().join(OsStr::from_bytes(b"\xff.json")),
        serde_json::to_vec(&device_page("100", "9s")).expect("serialize fixture"),
    )
    .expect("write non-UTF-8 named fixture");

    let documents = inventory::discover_documents(dir.path()).expect("discovery should succeed");
    assert_eq!(documents.documents.len(), 1);
    assert_eq!(documents.rejected.len(), 1);

    let output = run_fixture_pipeline(dir.path()).expect("pipeline should succeed");
    assert_eq!(output.counts.documents_seen, 2);
    assert_eq!(output.counts.documents_failed, 1);
    assert_eq!(output.counts.documents_parsed, 1);
    assert_eq!(output.database.recipes.len(), 1);
    assert_eq!(output.database.recipes["recipe_0"].manufacturing_time_seconds, Some(3));
    assert_eq!(output.source_hashes.len(), 1);
    assert!(output.warnings.iter().any(|warning| warning.contains("not valid UTF-8")));
}

#[test]
fn malformed_expectations_do_not_abort_build() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let details = root.join("item_details");
    fs::create_dir_all(&details).expect("details dir");
    write_document(&details, "100.json", &device_page("100", "3s"));
    write_json_pretty(
        &root.join("item_lookup.json"),
        &json!({ "100": { "name": "Assembler", "subTypeID": "5" } }),
    )
    .expect("write lookup");
    let expectations_path = default_expectations_path(root);
    fs::create_dir_all(expectations_path.parent().expect("manifests dir")).expect("manifests dir");
    fs::write(&expectations_path, b"{ not json").expect("write broken expectations");

    let manifest_path = root.join("manifests").join("build.json");
    let args = BuildArgs {
        data_root: root.to_path_buf(),
        details_dir: None,
        item_lookup_path: None,
        device_text_map_path: None,
        device_allowlist_path: None,
        role_keywords_path: None,
        output_path: None,
        sqlite_path: None,
        expectations_path: None,
        manifest_path: Some(manifest_path.clone()),
    };
    run(args).expect("build should succeed despite broken expectations");

    assert!(default_database_path(root).exists());
    assert!(!default_report_path(root).exists());
    let manifest: BuildRunManifest = read_json(&manifest_path).expect("manifest");
    assert_eq!(manifest.counts.recipes_total, 1);
    assert_eq!(manifest.counts.expectations_passed, 0);
    assert!(
        manifest
            .warnings
            .iter()
            .any(|warning| warning.starts_with("verification skipped"))
    );
}

#[test]
fn render_build_command_lists_explicit_paths() {
    let args = BuildArgs {
        data_root: PathBuf::from("data"),
        details_dir: None,
        item_lookup_path: None,
        device_text_map_path: None,
        device_allowlist_path: None,
        role_keywords_path: None,
        output_path: Some(PathBuf::from("out/db.json")),
        sqlite_path: None,
        expectations_path: None,
        manifest_path: None,
    };
    assert_eq!(
        run::render_build_command(&args),
        "recipedb build --data-root data --output-path out/db.json"
    );
}
