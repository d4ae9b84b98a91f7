//! Edge rule state definitions

use serde::{Deserialize, Serialize};

/// The three logical states of an edge rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeState {
    /// Predicate false, nothing pending
    Idle,
    /// Predicate true, waiting out the debounce window
    Pending,
    /// Predicate held long enough, action fired
    Activated,
}

impl std::fmt::Display for EdgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EdgeState::Idle => "IDLE",
            EdgeState::Pending => "PENDING",
            EdgeState::Activated => "ACTIVATED",
        };
        write!(f, "{}", name)
    }
}

/// Which action of a binding an edge fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Start,
    Stop,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Start => write!(f, "start"),
            EdgeKind::Stop => write!(f, "stop"),
        }
    }
}
