//! Facebind: turns per-frame facial blendshape scores into key/mouse actions
//!
//! Detector frame → ScoreVector → BindingEngine → ActionDispatcher

pub mod core;
pub mod types;

// =============================================================================
// SCORES [C]
// =============================================================================

/// Lowest blendshape score after scaling
pub const SCORE_MIN: u8 = 0;

/// Highest blendshape score after scaling (detector reports 0.0-1.0, we keep 0-100)
pub const SCORE_MAX: u8 = 100;

/// Score every vocabulary entry gets when probing a freshly compiled expression
pub const PROBE_SAMPLE_SCORE: u8 = 50;

// =============================================================================
// EXPRESSION LIMITS [C]
// =============================================================================

/// Longest expression source accepted by the compiler (bytes)
pub const MAX_EXPRESSION_LEN: usize = 1024;

/// Deepest nesting of parentheses, `not`, unary minus and `if` accepted
pub const MAX_NESTING_DEPTH: usize = 64;

// =============================================================================
// DIAGNOSTICS [C]
// =============================================================================

/// Diagnostics the API keeps for `GET /diagnostics` before dropping the oldest
pub const DIAGNOSTIC_BACKLOG: usize = 256;

// =============================================================================
// BINDING TEMPLATE [C] - values a freshly created binding starts with
// =============================================================================

/// Blendshape watched by a new simple binding
pub const DEFAULT_BLENDSHAPE: &str = "jawOpen";

/// Threshold of a new simple binding
pub const DEFAULT_THRESHOLD: u8 = 50;

/// Debounce of a new advanced edge rule (milliseconds)
pub const DEFAULT_DEBOUNCE_MS: u64 = 0;

/// Name given to a profile created without one
pub const DEFAULT_PROFILE_NAME: &str = "Default";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
