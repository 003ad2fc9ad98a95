pub mod issue;
pub mod types;
pub mod unit;

pub use issue::{FilteredIssue, Issue};
pub use types::{LabeledExample, RunSummary};
pub use unit::{Classification, ContentUnit, Label, UnitKind};
