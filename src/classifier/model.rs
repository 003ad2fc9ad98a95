use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::features::{tokenize, FeatureVector, TOKENIZER_VERSION};
use crate::domain::{Classification, Label, LabeledExample};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training set contains no {0:?} examples; priors would be undefined")]
    MissingClass(Label),
    #[error("smoothing constant must be positive, got {0}")]
    InvalidAlpha(f64),
}

/// Per-class value pair, used for both priors and conditional likelihoods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassPair {
    pub ad: f64,
    pub editorial: f64,
}

/// Trained naive-Bayes parameters. Built once by `train`, then read-only;
/// safe to share across any number of concurrent scoring calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Additive smoothing constant the conditionals were computed with,
    /// recorded so retraining is reproducible.
    pub alpha: f64,
    pub tokenizer_version: u32,
    pub priors: ClassPair,
    /// Conditional likelihood of each vocabulary token given the class.
    /// Every entry is strictly positive thanks to smoothing.
    pub vocabulary: BTreeMap<String, ClassPair>,
}

/// Builds a model from labeled unit texts. Priors are class fractions;
/// conditionals use additive smoothing
/// `(count + alpha) / (total + alpha * |V|)`.
pub fn train(examples: &[LabeledExample], alpha: f64) -> Result<Model, TrainingError> {
    if alpha <= 0.0 {
        return Err(TrainingError::InvalidAlpha(alpha));
    }

    let mut ad_examples = 0usize;
    let mut editorial_examples = 0usize;
    let mut counts: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    let mut ad_total = 0.0f64;
    let mut editorial_total = 0.0f64;

    for example in examples {
        let is_ad = example.label == Label::Ad;
        if is_ad {
            ad_examples += 1;
        } else {
            editorial_examples += 1;
        }
        for token in tokenize(&example.text) {
            let entry = counts.entry(token).or_insert((0.0, 0.0));
            if is_ad {
                entry.0 += 1.0;
                ad_total += 1.0;
            } else {
                entry.1 += 1.0;
                editorial_total += 1.0;
            }
        }
    }

    if ad_examples == 0 {
        return Err(TrainingError::MissingClass(Label::Ad));
    }
    if editorial_examples == 0 {
        return Err(TrainingError::MissingClass(Label::Editorial));
    }

    let total = (ad_examples + editorial_examples) as f64;
    let priors = ClassPair {
        ad: ad_examples as f64 / total,
        editorial: editorial_examples as f64 / total,
    };

    let vocab_size = counts.len() as f64;
    let vocabulary = counts
        .into_iter()
        .map(|(token, (in_ad, in_editorial))| {
            let pair = ClassPair {
                ad: (in_ad + alpha) / (ad_total + alpha * vocab_size),
                editorial: (in_editorial + alpha) / (editorial_total + alpha * vocab_size),
            };
            (token, pair)
        })
        .collect();

    Ok(Model {
        alpha,
        tokenizer_version: TOKENIZER_VERSION,
        priors,
        vocabulary,
    })
}

/// Scores one feature vector against the model. All accumulation happens in
/// log space; tokens outside the vocabulary contribute nothing. A tie goes
/// to editorial, so uncertainty never removes content.
pub fn classify(vector: &FeatureVector, model: &Model) -> Classification {
    let mut log_ad = model.priors.ad.ln();
    let mut log_editorial = model.priors.editorial.ln();

    for (token, weight) in vector.iter() {
        if let Some(pair) = model.vocabulary.get(token) {
            log_ad += weight * pair.ad.ln();
            log_editorial += weight * pair.editorial.ln();
        }
    }

    let log_odds = log_ad - log_editorial;
    let label = if log_odds > 0.0 {
        Label::Ad
    } else {
        Label::Editorial
    };
    let confidence = 1.0 / (1.0 + (-log_odds.abs()).exp());

    Classification {
        label,
        confidence,
        log_odds,
    }
}
