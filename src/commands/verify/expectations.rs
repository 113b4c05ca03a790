use super::*;

const REPORT_MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAmount {
    pub item_id: String,
    #[serde(deserialize_with = "count_as_string")]
    pub count: String,
}

/// Counts are strings in the database; accept `2` as well as `"2"` here.
fn count_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value.trim().to_string()),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number count, found {other}"
        ))),
    }
}

/// A recipe that must exist for `device_id`, matched exactly on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    #[serde(default)]
    pub label: Option<String>,
    pub device_id: String,
    #[serde(default)]
    pub required_materials: Vec<ExpectedAmount>,
    #[serde(default)]
    pub required_products: Vec<ExpectedAmount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationManifest {
    #[serde(default)]
    pub manifest_version: u32,
    #[serde(default)]
    pub expectations: Vec<Expectation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectationStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationResult {
    pub label: String,
    pub device_id: String,
    pub status: ExpectationStatus,
    pub matched_recipe_id: Option<String>,
    pub recipes_inspected: usize,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub manifest_version: u32,
    pub generated_at: String,
    pub database_path: String,
    pub recipes_total: usize,
    pub expectations_total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ExpectationResult>,
}

impl VerificationReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Returns `None` when no expectations file exists.
pub fn load_expectations(path: &Path) -> Result<Option<ExpectationManifest>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

fn multiset(amounts: impl Iterator<Item = (String, String)>) -> Vec<(String, String)> {
    let mut values = amounts.collect::<Vec<(String, String)>>();
    values.sort();
    values
}

fn record_side(amounts: &[NamedAmount]) -> Vec<(String, String)> {
    multiset(
        amounts
            .iter()
            .map(|amount| (amount.item_id.clone(), amount.count.clone())),
    )
}

fn expected_side(amounts: &[ExpectedAmount]) -> Vec<(String, String)> {
    multiset(
        amounts
            .iter()
            .map(|amount| (amount.item_id.clone(), amount.count.clone())),
    )
}

fn describe(expectation: &Expectation) -> String {
    if let Some(label) = &expectation.label {
        return label.clone();
    }

    let render = |amounts: &[ExpectedAmount]| {
        amounts
            .iter()
            .map(|amount| format!("{}x{}", amount.item_id, amount.count))
            .collect::<Vec<String>>()
            .join(" + ")
    };
    format!(
        "{}: {} -> {}",
        expectation.device_id,
        render(&expectation.required_materials),
        render(&expectation.required_products)
    )
}

pub fn evaluate_expectation(database: &RecipeDatabase, expectation: &Expectation) -> ExpectationResult {
    let label = describe(expectation);
    let wanted_materials = expected_side(&expectation.required_materials);
    let wanted_products = expected_side(&expectation.required_products);

    let recipe_ids = database
        .by_device
        .get(&expectation.device_id)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let matched = recipe_ids.iter().find(|recipe_id| {
        database
            .recipes
            .get(recipe_id.as_str())
            .map(|record| {
                record_side(&record.materials) == wanted_materials
                    && record_side(&record.products) == wanted_products
            })
            .unwrap_or(false)
    });

    match matched {
        Some(recipe_id) => ExpectationResult {
            label,
            device_id: expectation.device_id.clone(),
            status: ExpectationStatus::Pass,
            matched_recipe_id: Some(recipe_id.clone()),
            recipes_inspected: recipe_ids.len(),
            reason: None,
        },
        None => ExpectationResult {
            label,
            device_id: expectation.device_id.clone(),
            status: ExpectationStatus::Fail,
            matched_recipe_id: None,
            recipes_inspected: recipe_ids.len(),
            reason: Some(if recipe_ids.is_empty() {
                "device has no recipes".to_string()
            } else {
                "no recipe with exactly these materials and products".to_string()
            }),
        },
    }
}

/// Checks every expectation; failures are logged and reported, never raised.
pub fn verify_database(
    database: &RecipeDatabase,
    manifest: &ExpectationManifest,
    database_path: &str,
) -> VerificationReport {
    let results = manifest
        .expectations
        .iter()
        .map(|expectation| evaluate_expectation(database, expectation))
        .collect::<Vec<ExpectationResult>>();

    for result in &results {
        if result.status == ExpectationStatus::Fail {
            warn!(
                expectation = %result.label,
                device_id = %result.device_id,
                recipes_inspected = result.recipes_inspected,
                reason = %result.reason.as_deref().unwrap_or_default(),
                "expectation failed"
            );
        }
    }

    let passed = results
        .iter()
        .filter(|result| result.status == ExpectationStatus::Pass)
        .count();

    VerificationReport {
        manifest_version: REPORT_MANIFEST_VERSION,
        generated_at: now_utc_string(),
        database_path: database_path.to_string(),
        recipes_total: database.recipes.len(),
        expectations_total: results.len(),
        passed,
        failed: results.len() - passed,
        results,
    }
}
