// summary.rs - Succeeded / skipped / failed accounting for batch operations

use std::fmt;

/// Final tally of a batch operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub label: String,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub skipped_items: Vec<(String, String)>,
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn succeed(&mut self) {
        self.succeeded += 1;
    }

    pub fn skip(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        self.skipped += 1;
        self.skipped_items.push((item.into(), reason.into()));
    }

    pub fn fail(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push((item.into(), reason.into()));
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Multi-line report listing every skipped and failed item
    pub fn report(&self) -> String {
        let mut lines = vec![self.to_string()];
        for (item, reason) in &self.skipped_items {
            lines.push(format!("  ⏭️  skipped {}: {}", item, reason));
        }
        for (item, reason) in &self.failures {
            lines.push(format!("  ❌ failed {}: {}", item, reason));
        }
        lines.join("\n")
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} skipped, {} failed",
            self.label, self.succeeded, self.skipped, self.failed
        )
    }
}
