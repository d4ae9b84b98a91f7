//! Compiled predicate over a score vector

use std::fmt;
use std::sync::Arc;
use crate::types::{EvalError, ScoreVector};

/// A compiled boolean rule. Evaluation may fail per frame but never panics.
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Evaluate against one frame of scores
    fn evaluate(&self, scores: &ScoreVector) -> Result<bool, EvalError>;

    /// Blendshape names the predicate reads
    fn variables(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Predicates are shared between a rule and its clones
pub type SharedPredicate = Arc<dyn Predicate>;
