use serde::{Deserialize, Serialize};

use crate::domain::unit::Label;

/// One record of the offline training set (JSON lines).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledExample {
    pub text: String,
    pub label: Label,
}

/// Per-run accounting reported by the pipeline driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed_units: usize,
}
