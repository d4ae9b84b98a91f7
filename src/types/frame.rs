//! Detector frames as delivered by the face landmark detector
//!
//! Wire shape (one JSON object per frame):
//! `{"timestampMs": 16.7, "faceBlendshapes": [{"categories": [{"categoryName": "jawOpen", "score": 0.61}]}]}`
//! A detector that failed for the frame sends `{"timestampMs": .., "error": ".."}`.

use serde::{Deserialize, Serialize};
use crate::types::{DetectorError, ScoreVector};

/// One scored blendshape category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_name: String,
    /// Detector confidence, 0.0-1.0
    pub score: f64,
}

/// Categories for one detected face
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classifications {
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// One detector result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorFrame {
    /// Frame presentation time (milliseconds, monotonic)
    pub timestamp_ms: f64,
    /// One entry per detected face; only the first is used
    #[serde(default)]
    pub face_blendshapes: Vec<Classifications>,
    /// Set when the detector failed for this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectorFrame {
    /// Frame with one face built from `(name, raw score)` pairs
    pub fn with_face<I, S>(timestamp_ms: f64, raw: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            timestamp_ms,
            face_blendshapes: vec![Classifications {
                categories: raw.into_iter()
                    .map(|(name, score)| Category { category_name: name.into(), score })
                    .collect(),
            }],
            error: None,
        }
    }

    /// Parse one line of detector output
    pub fn from_json(line: &str) -> Result<Self, DetectorError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Scores of the first face.
    ///
    /// `Ok(None)` when no face was detected; `Err` when the detector failed.
    pub fn scores(&self) -> Result<Option<ScoreVector>, DetectorError> {
        if let Some(ref error) = self.error {
            return Err(DetectorError::Failed(error.clone()));
        }
        Ok(self.face_blendshapes.first().map(|face| {
            ScoreVector::from_raw(
                face.categories.iter().map(|c| (c.category_name.clone(), c.score)),
            )
        }))
    }
}
