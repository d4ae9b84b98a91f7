//! Binding model: the two rule shapes and their run-time state
//!
//! Run-time fields (activation flags, debounce timers, compiled predicates)
//! are never persisted and are only written by the evaluator and by
//! normalization at load time.

use serde::{Deserialize, Serialize};
use crate::{DEFAULT_BLENDSHAPE, DEFAULT_DEBOUNCE_MS, DEFAULT_THRESHOLD};
use crate::types::{EdgeKind, EdgeState, SharedPredicate};

// =============================================================================
// SIMPLE
// =============================================================================

/// Start/stop action tokens of a simple binding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPair {
    pub start: String,
    pub stop: String,
}

/// Single blendshape compared against a threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleBinding {
    /// Blendshape key, e.g. "jawOpen"
    pub blendshape: String,
    /// 0-100
    pub threshold: u8,
    pub actions: ActionPair,
    #[serde(skip)]
    pub(crate) activated: bool,
}

impl Default for SimpleBinding {
    fn default() -> Self {
        Self {
            blendshape: DEFAULT_BLENDSHAPE.to_string(),
            threshold: DEFAULT_THRESHOLD,
            actions: ActionPair::default(),
            activated: false,
        }
    }
}

impl SimpleBinding {
    pub fn new(blendshape: impl Into<String>, threshold: u8, start: impl Into<String>, stop: impl Into<String>) -> Self {
        Self {
            blendshape: blendshape.into(),
            threshold,
            actions: ActionPair { start: start.into(), stop: stop.into() },
            activated: false,
        }
    }

    /// Has the start action fired without a matching stop yet?
    pub fn activated(&self) -> bool {
        self.activated
    }
}

// =============================================================================
// ADVANCED
// =============================================================================

/// One half (start or stop) of an advanced binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRule {
    /// Expression source, empty means "never fires"
    pub logic: String,
    /// Minimum continuous-true duration before firing (milliseconds)
    pub debounce_ms: u64,
    /// Action token fired on activation
    pub action: String,
    #[serde(skip)]
    pub(crate) compiled: Option<SharedPredicate>,
    #[serde(skip)]
    pub(crate) activated: bool,
    /// Frame timestamp at which the predicate became true, `None` while idle
    #[serde(skip)]
    pub(crate) pending_since_ms: Option<f64>,
}

impl Default for EdgeRule {
    fn default() -> Self {
        Self {
            logic: String::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            action: String::new(),
            compiled: None,
            activated: false,
            pending_since_ms: None,
        }
    }
}

impl EdgeRule {
    /// Uncompiled rule; the engine compiles it on normalize or edit
    pub fn new(logic: impl Into<String>, debounce_ms: u64, action: impl Into<String>) -> Self {
        Self {
            logic: logic.into(),
            debounce_ms,
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn state(&self) -> EdgeState {
        if self.activated {
            EdgeState::Activated
        } else if self.pending_since_ms.is_some() {
            EdgeState::Pending
        } else {
            EdgeState::Idle
        }
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn pending_since_ms(&self) -> Option<f64> {
        self.pending_since_ms
    }

    /// Does the rule hold a predicate? `false` means it never fires.
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn predicate(&self) -> Option<&SharedPredicate> {
        self.compiled.as_ref()
    }

    /// Put the rule in a known state: activated or idle, no pending window
    pub(crate) fn reset_runtime(&mut self, activated: bool) {
        self.activated = activated;
        self.pending_since_ms = None;
    }
}

/// Independent start and stop edge rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedBinding {
    pub start: EdgeRule,
    pub stop: EdgeRule,
}

impl AdvancedBinding {
    pub fn new(start: EdgeRule, stop: EdgeRule) -> Self {
        Self { start, stop }
    }

    pub fn edge(&self, kind: EdgeKind) -> &EdgeRule {
        match kind {
            EdgeKind::Start => &self.start,
            EdgeKind::Stop => &self.stop,
        }
    }

    pub fn edge_mut(&mut self, kind: EdgeKind) -> &mut EdgeRule {
        match kind {
            EdgeKind::Start => &mut self.start,
            EdgeKind::Stop => &mut self.stop,
        }
    }
}

// =============================================================================
// BINDING
// =============================================================================

/// A user rule: exactly one of the two shapes at a time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Binding {
    Simple(SimpleBinding),
    Advanced(AdvancedBinding),
}

impl Default for Binding {
    fn default() -> Self {
        Self::template()
    }
}

impl Binding {
    /// Immutable default every new binding is cloned from
    pub fn template() -> Self {
        Binding::Simple(SimpleBinding::default())
    }

    pub fn simplified(&self) -> bool {
        matches!(self, Binding::Simple(_))
    }

    pub fn as_simple(&self) -> Option<&SimpleBinding> {
        match self {
            Binding::Simple(simple) => Some(simple),
            Binding::Advanced(_) => None,
        }
    }

    pub fn as_advanced(&self) -> Option<&AdvancedBinding> {
        match self {
            Binding::Simple(_) => None,
            Binding::Advanced(advanced) => Some(advanced),
        }
    }

    pub fn as_advanced_mut(&mut self) -> Option<&mut AdvancedBinding> {
        match self {
            Binding::Simple(_) => None,
            Binding::Advanced(advanced) => Some(advanced),
        }
    }

    /// Switch between simple and advanced shape.
    ///
    /// Action tokens carry over; everything else starts from the template.
    /// The new shape is returned uncompiled and with fresh run-time state.
    pub fn set_simplified(&mut self, simplified: bool) {
        if self.simplified() == simplified {
            return;
        }
        let next = match &*self {
            Binding::Simple(simple) => Binding::Advanced(AdvancedBinding::new(
                EdgeRule::new("", DEFAULT_DEBOUNCE_MS, simple.actions.start.clone()),
                EdgeRule::new("", DEFAULT_DEBOUNCE_MS, simple.actions.stop.clone()),
            )),
            Binding::Advanced(advanced) => Binding::Simple(SimpleBinding {
                actions: ActionPair {
                    start: advanced.start.action.clone(),
                    stop: advanced.stop.action.clone(),
                },
                ..SimpleBinding::default()
            }),
        };
        *self = next;
        self.reset_runtime();
    }

    /// Reset run-time fields to the load-time values.
    ///
    /// Simple: not activated. Advanced: start idle, stop activated, so a
    /// stop condition that already holds at load does not fire until it has
    /// been released once.
    pub fn reset_runtime(&mut self) {
        match self {
            Binding::Simple(simple) => simple.activated = false,
            Binding::Advanced(advanced) => {
                advanced.start.reset_runtime(false);
                advanced.stop.reset_runtime(true);
            }
        }
    }

    /// Comparable view of the run-time fields
    pub fn runtime(&self) -> RuntimeState {
        match self {
            Binding::Simple(simple) => RuntimeState::Simple { activated: simple.activated },
            Binding::Advanced(advanced) => RuntimeState::Advanced {
                start: EdgeRuntime::of(&advanced.start),
                stop: EdgeRuntime::of(&advanced.stop),
            },
        }
    }
}

/// Run-time view of one edge rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRuntime {
    pub state: EdgeState,
    pub pending_since_ms: Option<f64>,
    pub compiled: bool,
}

impl EdgeRuntime {
    fn of(rule: &EdgeRule) -> Self {
        Self {
            state: rule.state(),
            pending_since_ms: rule.pending_since_ms,
            compiled: rule.is_compiled(),
        }
    }
}

/// Run-time view of a binding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RuntimeState {
    Simple { activated: bool },
    Advanced { start: EdgeRuntime, stop: EdgeRuntime },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_simple() {
        let binding = Binding::template();
        assert!(binding.simplified());
        let simple = binding.as_simple().unwrap();
        assert_eq!(simple.blendshape, DEFAULT_BLENDSHAPE);
        assert_eq!(simple.threshold, DEFAULT_THRESHOLD);
        assert!(!simple.activated());
    }

    #[test]
    fn test_edge_state_derivation() {
        let mut rule = EdgeRule::new("jawOpen > 50", 100, "key:space");
        assert_eq!(rule.state(), EdgeState::Idle);
        rule.pending_since_ms = Some(12.0);
        assert_eq!(rule.state(), EdgeState::Pending);
        rule.activated = true;
        assert_eq!(rule.state(), EdgeState::Activated);
    }

    #[test]
    fn test_reset_runtime_advanced() {
        let mut binding = Binding::Advanced(AdvancedBinding::default());
        if let Binding::Advanced(adv) = &mut binding {
            adv.start.activated = true;
            adv.stop.pending_since_ms = Some(40.0);
        }
        binding.reset_runtime();
        let adv = binding.as_advanced().unwrap();
        assert_eq!(adv.start.state(), EdgeState::Idle);
        assert_eq!(adv.stop.state(), EdgeState::Activated);
        assert_eq!(adv.stop.pending_since_ms(), None);
    }

    #[test]
    fn test_switch_mode_carries_actions() {
        let mut binding = Binding::Simple(SimpleBinding::new("jawOpen", 40, "down:space", "up:space"));
        binding.set_simplified(false);
        let adv = binding.as_advanced().unwrap();
        assert_eq!(adv.start.action, "down:space");
        assert_eq!(adv.stop.action, "up:space");
        assert!(adv.start.logic.is_empty());

        binding.set_simplified(true);
        let simple = binding.as_simple().unwrap();
        assert_eq!(simple.actions.start, "down:space");
        assert_eq!(simple.actions.stop, "up:space");
        assert_eq!(simple.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_runtime_fields_not_serialized() {
        let mut simple = SimpleBinding::new("jawOpen", 40, "key:a", "");
        simple.activated = true;
        let json = serde_json::to_value(Binding::Simple(simple)).unwrap();
        assert_eq!(json["mode"], "simple");
        assert!(json.get("activated").is_none());

        let rule = EdgeRule::new("jawOpen > 1", 0, "key:b");
        let json = serde_json::to_value(&rule).unwrap();
        assert!(json.get("activated").is_none());
        assert!(json.get("pending_since_ms").is_none());
        assert!(json.get("compiled").is_none());
    }
}
