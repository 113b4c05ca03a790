use super::*;

/// Compiled extraction vocabulary shared by every table in a run.
#[derive(Debug)]
pub struct ExtractionRules {
    pub keywords: RoleKeywords,
    time_pattern: Regex,
}

impl ExtractionRules {
    pub fn new(keywords: RoleKeywords) -> Result<Self> {
        Ok(Self {
            keywords,
            time_pattern: Regex::new(r"^(\d+)s$")
                .context("failed to compile manufacturing time regex")?,
        })
    }

    /// `"3s"` is three seconds. Anything else is unknown, never zero.
    pub fn parse_time(&self, raw: &str) -> Option<u32> {
        self.time_pattern
            .captures(raw.trim())
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse::<u32>().ok())
    }
}
