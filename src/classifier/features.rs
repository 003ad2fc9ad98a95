use std::collections::BTreeMap;

use crate::domain::{ContentUnit, UnitKind};

/// Bumped whenever the token scheme below changes shape. Persisted with the
/// model so a stale artifact cannot be scored against a different scheme.
pub const TOKENIZER_VERSION: u32 = 1;

/// Sparse token-to-weight mapping for one content unit. Weights are
/// occurrence counts, scaled for heading tokens; iteration order is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    weights: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn add(&mut self, token: String, weight: f64) {
        *self.weights.entry(token).or_insert(0.0) += weight;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(token, w)| (token.as_str(), *w))
    }

    pub fn get(&self, token: &str) -> Option<f64> {
        self.weights.get(token).copied()
    }

    /// Features for plain text with no structural context, as used when
    /// building the training counts.
    pub fn from_text(text: &str) -> Self {
        let mut vector = Self::default();
        for token in tokenize(text) {
            vector.add(token, 1.0);
        }
        vector
    }

    /// Features for one segmented unit. Tokens of the governing section
    /// heading (and of a heading unit's own text) are weighted by
    /// `heading_boost`, mirroring how heavily heading words identify a
    /// sponsor block in this newsletter format.
    pub fn from_unit(unit: &ContentUnit, heading_boost: f64) -> Self {
        let mut vector = Self::default();
        let own_weight = if matches!(unit.kind, UnitKind::Heading { .. }) {
            heading_boost
        } else {
            1.0
        };
        for token in tokenize(&unit.text) {
            vector.add(token, own_weight);
        }
        if let Some(heading) = &unit.section_heading {
            for token in tokenize(heading) {
                vector.add(token, heading_boost);
            }
        }
        vector
    }
}

/// Deterministic tokenizer: Unicode-lowercased alphanumeric runs become word
/// tokens; CJK characters become overlapping character bigrams (a lone CJK
/// character stays a unigram). Everything else separates tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut prev_cjk: Option<char> = None;
    let mut cjk_run = 0usize;

    fn flush_word(word: &mut String, tokens: &mut Vec<String>) {
        if !word.is_empty() {
            tokens.push(std::mem::take(word));
        }
    }
    fn flush_cjk(prev: &mut Option<char>, run: &mut usize, tokens: &mut Vec<String>) {
        if let Some(ch) = prev.take() {
            if *run == 1 {
                tokens.push(ch.to_string());
            }
        }
        *run = 0;
    }

    for ch in text.chars().flat_map(char::to_lowercase) {
        if is_cjk(ch) {
            flush_word(&mut word, &mut tokens);
            if let Some(prev) = prev_cjk {
                let mut bigram = String::with_capacity(8);
                bigram.push(prev);
                bigram.push(ch);
                tokens.push(bigram);
            }
            prev_cjk = Some(ch);
            cjk_run += 1;
        } else if ch.is_alphanumeric() {
            flush_cjk(&mut prev_cjk, &mut cjk_run, &mut tokens);
            word.push(ch);
        } else {
            flush_word(&mut word, &mut tokens);
            flush_cjk(&mut prev_cjk, &mut cjk_run, &mut tokens);
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_cjk(&mut prev_cjk, &mut cjk_run, &mut tokens);
    tokens
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}
