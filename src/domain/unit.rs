use serde::{Deserialize, Serialize};

/// One classifiable block within an issue. Immutable once produced by the
/// segmenter; `raw` is the exact byte slice of the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUnit {
    pub ordinal: usize,
    pub raw: String,
    /// Collapsed plain text, what the feature extractor sees.
    pub text: String,
    pub kind: UnitKind,
    /// Plain text of the heading this unit sits under, if any. Heading
    /// units carry `None`; their own text is the heading.
    pub section_heading: Option<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Heading { level: u8 },
    Paragraph,
    ListItem { ordered: bool },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Ad,
    Editorial,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Ad => f.write_str("ad"),
            Label::Editorial => f.write_str("editorial"),
        }
    }
}

/// Outcome of scoring one unit against the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: Label,
    /// Posterior probability of the assigned label, in [0.5, 1].
    pub confidence: f64,
    /// ln P(ad | unit) - ln P(editorial | unit).
    pub log_odds: f64,
}
