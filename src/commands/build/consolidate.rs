use super::*;

const RECIPE_ID_PREFIX: &str = "recipe_";

#[derive(Debug, Default)]
pub struct Consolidation {
    pub database: RecipeDatabase,
    /// Lookups that fell back to the `Unknown(<id>)` placeholder.
    pub missing_names: usize,
}

/// Assigns `recipe_<n>` ids in first-insertion order, attaches display
/// names and derives the reverse indices.
pub fn consolidate(entries: Vec<(String, RecipeCandidate)>, lookup: &ItemLookup) -> Consolidation {
    let mut missing_names = 0_usize;
    let mut name_for = |item_id: &str| {
        let (name, found) = lookup.display_name(item_id);
        if !found {
            missing_names += 1;
        }
        name
    };

    let mut recipes = BTreeMap::new();
    for (ordinal, (_, candidate)) in entries.into_iter().enumerate() {
        let id = format!("{RECIPE_ID_PREFIX}{ordinal}");
        let device_name = name_for(&candidate.device_id);
        let materials = candidate
            .materials
            .iter()
            .map(|amount| named_amount(amount, &mut name_for))
            .collect();
        let products = candidate
            .products
            .iter()
            .map(|amount| named_amount(amount, &mut name_for))
            .collect();

        recipes.insert(
            id.clone(),
            RecipeRecord {
                id,
                device_id: candidate.device_id,
                device_name,
                materials,
                products,
                manufacturing_time_seconds: candidate.manufacturing_time_seconds,
                provenance: candidate.provenance,
            },
        );
    }

    Consolidation {
        database: index_recipes(recipes),
        missing_names,
    }
}

fn named_amount(amount: &ItemAmount, name_for: &mut impl FnMut(&str) -> String) -> NamedAmount {
    NamedAmount {
        item_id: amount.item_id.clone(),
        name: name_for(&amount.item_id),
        count: amount.count.clone(),
    }
}

pub fn recipe_ordinal(recipe_id: &str) -> Option<usize> {
    recipe_id
        .strip_prefix(RECIPE_ID_PREFIX)
        .and_then(|suffix| suffix.parse().ok())
}

/// Builds the three indices with one scan over `recipes`, visiting records
/// in id ordinal order so index lists follow insertion order.
pub fn index_recipes(recipes: BTreeMap<String, RecipeRecord>) -> RecipeDatabase {
    let mut ordered = recipes.values().collect::<Vec<&RecipeRecord>>();
    ordered.sort_by(|a, b| {
        recipe_ordinal(&a.id)
            .cmp(&recipe_ordinal(&b.id))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut as_materials = BTreeMap::<String, Vec<String>>::new();
    let mut as_products = BTreeMap::<String, Vec<String>>::new();
    let mut by_device = BTreeMap::<String, Vec<String>>::new();

    for record in ordered {
        for material in &record.materials {
            push_unique(&mut as_materials, &material.item_id, &record.id);
        }
        for product in &record.products {
            push_unique(&mut as_products, &product.item_id, &record.id);
        }
        push_unique(&mut by_device, &record.device_id, &record.id);
    }

    RecipeDatabase {
        recipes,
        as_materials,
        as_products,
        by_device,
    }
}

fn push_unique(index: &mut BTreeMap<String, Vec<String>>, key: &str, recipe_id: &str) {
    let ids = index.entry(key.to_string()).or_default();
    if ids.last().map(String::as_str) != Some(recipe_id) {
        ids.push(recipe_id.to_string());
    }
}

/// Every indexed id must exist in `recipes`, and every recipe must be
/// reachable from at least one index.
pub fn check_integrity(database: &RecipeDatabase) -> Result<(), IntegrityError> {
    let indices = [
        ("asMaterials", &database.as_materials),
        ("asProducts", &database.as_products),
        ("byDevice", &database.by_device),
    ];

    let mut reachable = HashSet::<&str>::new();
    for (index, entries) in indices {
        for (key, recipe_ids) in entries {
            for recipe_id in recipe_ids {
                if !database.recipes.contains_key(recipe_id) {
                    return Err(IntegrityError::DanglingIndexEntry {
                        index,
                        key: key.clone(),
                        recipe_id: recipe_id.clone(),
                    });
                }
                reachable.insert(recipe_id.as_str());
            }
        }
    }

    if let Some(orphan) = database
        .recipes
        .keys()
        .find(|recipe_id| !reachable.contains(recipe_id.as_str()))
    {
        return Err(IntegrityError::OrphanRecord {
            recipe_id: orphan.clone(),
        });
    }

    Ok(())
}
