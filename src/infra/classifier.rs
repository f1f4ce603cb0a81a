//! In-process multinomial naive Bayes text classifier.
//!
//! Trained once at startup on a small seed corpus covering the five
//! classifiable incident categories. Confidences are normalised posteriors.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::domain::{CategoryScore, IncidentType, TextClassification};

use super::{RelayError, Result, TextClassifier};

/// Seed training documents, one or more per category.
pub const SEED_CORPUS: &[(IncidentType, &str)] = &[
    (IncidentType::VoteBuying, "money exchange votes payment bribe"),
    (IncidentType::VoteBuying, "cash handed to voters paid to vote for candidate"),
    (IncidentType::Intimidation, "intimidate threaten force coerce"),
    (IncidentType::Intimidation, "armed men threatening voters chased away from polling unit"),
    (IncidentType::BallotStuffing, "ballot box stuffing multiple votes"),
    (IncidentType::BallotStuffing, "extra ballots thumbprinted and stuffed into box"),
    (IncidentType::Tampering, "change modify tamper alter"),
    (IncidentType::Tampering, "result sheet altered figures changed after counting"),
    (IncidentType::Misinformation, "fake news false information misleading"),
    (IncidentType::Misinformation, "rumour spread online that polling was cancelled"),
];

/// Lowercase alphanumeric tokens with a plural `s` stripped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let t = t.to_lowercase();
            if t.len() > 3 && t.ends_with('s') && !t.ends_with("ss") {
                t[..t.len() - 1].to_string()
            } else {
                t
            }
        })
        .collect()
}

#[derive(Debug, Default, Clone)]
struct ClassStats {
    documents: usize,
    tokens: usize,
    counts: HashMap<String, usize>,
}

/// Multinomial naive Bayes with Laplace smoothing.
#[derive(Debug, Clone)]
pub struct NaiveBayesClassifier {
    /// Categories in training order; ties resolve to the earliest.
    labels: Vec<IncidentType>,
    stats: HashMap<IncidentType, ClassStats>,
    vocabulary: HashSet<String>,
    documents: usize,
}

impl Default for NaiveBayesClassifier {
    fn default() -> Self {
        Self::train(SEED_CORPUS.iter().copied())
    }
}

impl NaiveBayesClassifier {
    pub fn train<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (IncidentType, &'a str)>,
    {
        let mut labels = Vec::new();
        let mut stats: HashMap<IncidentType, ClassStats> = HashMap::new();
        let mut vocabulary = HashSet::new();
        let mut total = 0;

        for (label, text) in documents {
            if !stats.contains_key(&label) {
                labels.push(label);
            }
            let class = stats.entry(label).or_default();
            class.documents += 1;
            total += 1;
            for token in tokenize(text) {
                class.tokens += 1;
                *class.counts.entry(token.clone()).or_default() += 1;
                vocabulary.insert(token);
            }
        }

        Self {
            labels,
            stats,
            vocabulary,
            documents: total,
        }
    }

    pub fn labels(&self) -> &[IncidentType] {
        &self.labels
    }

    /// Posterior probability per category, highest first.
    pub fn scores(&self, text: &str) -> Vec<CategoryScore> {
        let tokens: Vec<String> = tokenize(text)
            .into_iter()
            .filter(|t| self.vocabulary.contains(t))
            .collect();
        let vocab = self.vocabulary.len() as f64;

        let log_posteriors: Vec<(IncidentType, f64)> = self
            .labels
            .iter()
            .map(|label| {
                let class = &self.stats[label];
                let prior = (class.documents as f64 / self.documents as f64).ln();
                let denominator = class.tokens as f64 + vocab;
                let likelihood: f64 = tokens
                    .iter()
                    .map(|t| {
                        let count = class.counts.get(t).copied().unwrap_or(0) as f64;
                        ((count + 1.0) / denominator).ln()
                    })
                    .sum();
                (*label, prior + likelihood)
            })
            .collect();

        // Normalise in log space to avoid underflow on long texts.
        let max = log_posteriors
            .iter()
            .map(|(_, lp)| *lp)
            .fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<(IncidentType, f64)> = log_posteriors
            .into_iter()
            .map(|(label, lp)| (label, (lp - max).exp()))
            .collect();
        let total: f64 = exp.iter().map(|(_, e)| e).sum();

        let mut scores: Vec<CategoryScore> = exp
            .into_iter()
            .map(|(label, e)| CategoryScore {
                label: label.classifier_label().to_string(),
                score: e / total,
            })
            .collect();
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores
    }

    pub fn classify_text(&self, text: &str) -> Option<TextClassification> {
        let scores = self.scores(text);
        let top = scores.first()?.clone();
        Some(TextClassification {
            label: top.label,
            confidence: top.score,
            scores,
        })
    }
}

#[async_trait]
impl TextClassifier for NaiveBayesClassifier {
    async fn classify(&self, text: &str) -> Result<TextClassification> {
        if text.trim().is_empty() {
            return Err(RelayError::validation("text", "text is required"));
        }
        self.classify_text(text)
            .ok_or_else(|| RelayError::Internal("classifier has no categories".into()))
    }
}
