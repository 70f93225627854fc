use shared::EmotionLabel;
use std::collections::BTreeMap;
use strum::EnumCount;

use super::VisionError;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub emotion: EmotionLabel,
    /// Percentage of the winning class, 2 decimals.
    pub confidence: f64,
    pub all_predictions: BTreeMap<EmotionLabel, f64>,
}

impl Classification {
    /// Maps a probability vector in label index order onto a classification.
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self, VisionError> {
        if probabilities.len() != EmotionLabel::COUNT {
            return Err(VisionError::Inference(format!(
                "expected {} class probabilities, model returned {}",
                EmotionLabel::COUNT,
                probabilities.len()
            )));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(VisionError::Inference(
                "model returned non-finite probabilities".to_string(),
            ));
        }

        // first maximum wins, as with argmax
        let (best_index, best) = probabilities
            .iter()
            .enumerate()
            .fold((0, probabilities[0]), |(best_i, best_p), (i, p)| {
                if *p > best_p { (i, *p) } else { (best_i, best_p) }
            });

        let emotion = EmotionLabel::from_index(best_index)
            .ok_or_else(|| VisionError::Inference(format!("no label for class {}", best_index)))?;

        let all_predictions = probabilities
            .iter()
            .enumerate()
            .filter_map(|(i, p)| EmotionLabel::from_index(i).map(|label| (label, to_percent(*p))))
            .collect();

        Ok(Self {
            emotion,
            confidence: to_percent(best),
            all_predictions,
        })
    }
}

fn to_percent(probability: f32) -> f64 {
    (probability as f64 * 100.0 * 100.0).round() / 100.0
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}
