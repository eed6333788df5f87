//! Prediction response model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probability {
    pub label: String,
    pub prob: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub top_label: String,
    pub confidence: f32,
    pub probabilities: Vec<Probability>,
    pub saved_filename: String,
}

impl PredictionResult {
    /// Shape a probability vector into a response.
    ///
    /// Indices without a label are named by their index.
    pub fn from_scores(scores: &[f32], class_labels: &[String], saved_filename: String) -> Self {
        let label_for = |i: usize| class_labels.get(i).cloned().unwrap_or_else(|| i.to_string());

        let top_idx = argmax(scores);
        let probabilities = scores
            .iter()
            .enumerate()
            .map(|(i, &prob)| Probability { label: label_for(i), prob })
            .collect();

        Self {
            top_label: label_for(top_idx),
            confidence: scores.get(top_idx).copied().unwrap_or(0.0),
            probabilities,
            saved_filename,
        }
    }
}

/// Index of the largest score; ties go to the lowest index.
pub fn argmax(scores: &[f32]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &s)| {
            if s > best { (i, s) } else { (best_i, best) }
        })
        .0
}
