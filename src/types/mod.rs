//! Core types for Facebind

mod action;
mod binding;
mod error;
mod frame;
mod output;
mod predicate;
mod profile;
mod reason;
mod scores;
mod settings;
mod state;

pub use action::{ActionStep, ActionToken, MouseButton};
pub use binding::{ActionPair, AdvancedBinding, Binding, EdgeRule, EdgeRuntime, RuntimeState, SimpleBinding};
pub use error::{CompileError, DetectorError, DispatchError, EvalError, ProfileError};
pub use frame::{Category, Classifications, DetectorFrame};
pub use output::{Diagnostic, FrameReport, FrameStatus, TransitionEvent};
pub use predicate::{Predicate, SharedPredicate};
pub use profile::{Profile, ProfileSet};
pub use reason::ReasonCode;
pub use scores::{ScoreVector, BLENDSHAPE_NAMES, is_known_blendshape, scale_score};
pub use settings::Settings;
pub use state::{EdgeKind, EdgeState};
