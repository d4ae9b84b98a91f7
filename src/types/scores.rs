//! Score vector: one frame of blendshape intensities
//!
//! The detector reports each blendshape as a 0.0-1.0 confidence. The engine
//! works on integer scores 0-100, rounded the same way for every frame.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::{SCORE_MAX, SCORE_MIN, PROBE_SAMPLE_SCORE};

/// Blendshape vocabulary produced by the face landmark detector (52 entries)
pub const BLENDSHAPE_NAMES: [&str; 52] = [
    "_neutral",
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "eyeBlinkLeft",
    "eyeBlinkRight",
    "eyeLookDownLeft",
    "eyeLookDownRight",
    "eyeLookInLeft",
    "eyeLookInRight",
    "eyeLookOutLeft",
    "eyeLookOutRight",
    "eyeLookUpLeft",
    "eyeLookUpRight",
    "eyeSquintLeft",
    "eyeSquintRight",
    "eyeWideLeft",
    "eyeWideRight",
    "jawForward",
    "jawLeft",
    "jawOpen",
    "jawRight",
    "mouthClose",
    "mouthDimpleLeft",
    "mouthDimpleRight",
    "mouthFrownLeft",
    "mouthFrownRight",
    "mouthFunnel",
    "mouthLeft",
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "mouthPressLeft",
    "mouthPressRight",
    "mouthPucker",
    "mouthRight",
    "mouthRollLower",
    "mouthRollUpper",
    "mouthShrugLower",
    "mouthShrugUpper",
    "mouthSmileLeft",
    "mouthSmileRight",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthUpperUpLeft",
    "mouthUpperUpRight",
    "noseSneerLeft",
    "noseSneerRight",
];

/// Is this name part of the detector vocabulary?
pub fn is_known_blendshape(name: &str) -> bool {
    BLENDSHAPE_NAMES.contains(&name)
}

/// Scale a raw detector confidence (0.0-1.0) to an integer score (0-100)
pub fn scale_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return SCORE_MIN;
    }
    (raw * 100.0).round().clamp(SCORE_MIN as f64, SCORE_MAX as f64) as u8
}

/// Immutable per-frame mapping from blendshape name to score (0-100)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreVector {
    scores: BTreeMap<String, u8>,
}

impl ScoreVector {
    /// Create an empty vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw detector confidences (0.0-1.0)
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        raw.into_iter()
            .map(|(name, score)| (name.into(), scale_score(score)))
            .collect()
    }

    /// Every vocabulary entry at the probe score
    pub fn probe_sample() -> Self {
        BLENDSHAPE_NAMES.iter()
            .map(|name| (name.to_string(), PROBE_SAMPLE_SCORE))
            .collect()
    }

    /// Builder-style insert, clamps to 0-100
    pub fn with(mut self, name: impl Into<String>, score: u8) -> Self {
        self.scores.insert(name.into(), score.min(SCORE_MAX));
        self
    }

    /// Score for a blendshape, `None` when the detector did not report it
    pub fn get(&self, name: &str) -> Option<u8> {
        self.scores.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u8)> for ScoreVector {
    fn from_iter<T: IntoIterator<Item = (String, u8)>>(iter: T) -> Self {
        Self {
            scores: iter.into_iter()
                .map(|(k, v)| (k, v.min(SCORE_MAX)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_score_rounds() {
        assert_eq!(scale_score(0.0), 0);
        assert_eq!(scale_score(0.494), 49);
        assert_eq!(scale_score(0.495), 50);
        assert_eq!(scale_score(1.0), 100);
    }

    #[test]
    fn test_scale_score_clamps() {
        assert_eq!(scale_score(-0.3), 0);
        assert_eq!(scale_score(1.7), 100);
        assert_eq!(scale_score(f64::NAN), 0);
    }

    #[test]
    fn test_from_raw() {
        let scores = ScoreVector::from_raw(vec![("jawOpen", 0.62), ("eyeBlinkLeft", 0.051)]);
        assert_eq!(scores.get("jawOpen"), Some(62));
        assert_eq!(scores.get("eyeBlinkLeft"), Some(5));
        assert_eq!(scores.get("mouthPucker"), None);
    }

    #[test]
    fn test_with_clamps_to_max() {
        let scores = ScoreVector::new().with("jawOpen", 250);
        assert_eq!(scores.get("jawOpen"), Some(100));
    }

    #[test]
    fn test_probe_sample_covers_vocabulary() {
        let sample = ScoreVector::probe_sample();
        assert_eq!(sample.len(), BLENDSHAPE_NAMES.len());
        assert!(sample.iter().all(|(_, v)| v == PROBE_SAMPLE_SCORE));
    }

    #[test]
    fn test_vocabulary_lookup() {
        assert!(is_known_blendshape("mouthSmileLeft"));
        assert!(!is_known_blendshape("mouthSmile"));
    }
}
