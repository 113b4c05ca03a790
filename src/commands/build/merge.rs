use super::*;

/// Canonical identity of a recipe: `device|materials|products`, each list
/// rendered as sorted `itemId:count` pairs joined by commas.
pub fn fingerprint(candidate: &RecipeCandidate) -> String {
    format!(
        "{}|{}|{}",
        candidate.device_id,
        sorted_join(&candidate.materials),
        sorted_join(&candidate.products)
    )
}

fn sorted_join(amounts: &[ItemAmount]) -> String {
    let mut parts = amounts
        .iter()
        .map(|amount| format!("{}:{}", amount.item_id, amount.count))
        .collect::<Vec<String>>();
    parts.sort();
    parts.join(",")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    Kept,
}

/// Whether `incoming` should take the place of `existing` for the same
/// fingerprint. Time presence ranks first, then provenance; ties keep the
/// first-seen candidate.
pub fn should_replace(existing: &RecipeCandidate, incoming: &RecipeCandidate) -> bool {
    match (
        existing.manufacturing_time_seconds.is_some(),
        incoming.manufacturing_time_seconds.is_some(),
    ) {
        (false, true) => true,
        (true, false) => false,
        _ => incoming.provenance > existing.provenance,
    }
}

/// Fingerprint → best candidate, remembering first-insertion order.
#[derive(Debug, Default)]
pub struct RecipeMerger {
    entries: Vec<(String, RecipeCandidate)>,
    positions: HashMap<String, usize>,
    replacements: usize,
}

impl RecipeMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, candidate: RecipeCandidate) -> MergeOutcome {
        let key = fingerprint(&candidate);

        match self.positions.get(&key) {
            Some(&position) => {
                let existing = &mut self.entries[position].1;
                if should_replace(existing, &candidate) {
                    debug!(
                        fingerprint = %key,
                        from = existing.provenance.as_str(),
                        to = candidate.provenance.as_str(),
                        "replacing merged candidate"
                    );
                    *existing = candidate;
                    self.replacements += 1;
                    MergeOutcome::Replaced
                } else {
                    MergeOutcome::Kept
                }
            }
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, candidate));
                MergeOutcome::Inserted
            }
        }
    }

    pub fn offer_all(&mut self, candidates: impl IntoIterator<Item = RecipeCandidate>) {
        for candidate in candidates {
            self.offer(candidate);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }

    pub fn get(&self, key: &str) -> Option<&RecipeCandidate> {
        self.positions
            .get(key)
            .map(|position| &self.entries[*position].1)
    }

    /// Entries in first-insertion order.
    pub fn into_entries(self) -> Vec<(String, RecipeCandidate)> {
        self.entries
    }
}
