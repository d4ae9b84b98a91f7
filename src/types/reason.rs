//! Reason codes for diagnostics and binding transitions

use serde::{Deserialize, Serialize};

/// Reason codes for every failure and state change the engine reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R1xx: Contained failures
    // =========================================================================
    /// Expression did not compile, rule disabled until edited
    R101_COMPILE_FAILED,
    /// Predicate raised while evaluating a frame, treated as false
    R102_EVAL_FAILED,
    /// Actuator refused or failed an action token
    R103_DISPATCH_FAILED,
    /// Expression names a blendshape the detector never reports
    R104_UNKNOWN_BLENDSHAPE,
    /// Detector failed for a frame, frame skipped
    R105_DETECTOR_FAILED,

    // =========================================================================
    // R2xx: Transitions
    // =========================================================================
    /// Simple binding crossed above its threshold
    R201_SIMPLE_START,
    /// Simple binding crossed below its threshold
    R202_SIMPLE_STOP,
    /// Edge rule predicate became true, debounce window opened
    R203_EDGE_PENDING,
    /// Edge rule asserted, action fired
    R204_EDGE_ACTIVATED,
    /// Edge rule predicate released, back to idle
    R205_EDGE_RELEASED,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R101_COMPILE_FAILED => "R101_COMPILE_FAILED",
            Self::R102_EVAL_FAILED => "R102_EVAL_FAILED",
            Self::R103_DISPATCH_FAILED => "R103_DISPATCH_FAILED",
            Self::R104_UNKNOWN_BLENDSHAPE => "R104_UNKNOWN_BLENDSHAPE",
            Self::R105_DETECTOR_FAILED => "R105_DETECTOR_FAILED",
            Self::R201_SIMPLE_START => "R201_SIMPLE_START",
            Self::R202_SIMPLE_STOP => "R202_SIMPLE_STOP",
            Self::R203_EDGE_PENDING => "R203_EDGE_PENDING",
            Self::R204_EDGE_ACTIVATED => "R204_EDGE_ACTIVATED",
            Self::R205_EDGE_RELEASED => "R205_EDGE_RELEASED",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R101_COMPILE_FAILED => "Expression rejected, rule never fires",
            Self::R102_EVAL_FAILED => "Evaluation failed, treated as false",
            Self::R103_DISPATCH_FAILED => "Action not carried out",
            Self::R104_UNKNOWN_BLENDSHAPE => "Unknown blendshape, reads as absent",
            Self::R105_DETECTOR_FAILED => "Detector failed, frame skipped",
            Self::R201_SIMPLE_START => "Score above threshold",
            Self::R202_SIMPLE_STOP => "Score below threshold",
            Self::R203_EDGE_PENDING => "Debounce window opened",
            Self::R204_EDGE_ACTIVATED => "Condition held, action fired",
            Self::R205_EDGE_RELEASED => "Condition released",
        }
    }

    /// Is this a contained failure (as opposed to a transition)?
    pub fn is_failure(&self) -> bool {
        self.code().starts_with("R1")
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
