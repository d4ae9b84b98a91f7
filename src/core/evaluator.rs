//! Binding evaluator: drives bindings through their state machines
//!
//! Simple binding (no timing state):
//! - not activated, score > threshold → fire start, activated
//! - activated, score < threshold → fire stop, not activated
//! - score == threshold → hold
//!
//! Edge rule (start and stop of an advanced binding, evaluated independently):
//! - predicate false → IDLE, no action
//! - predicate true, already ACTIVATED → no-op
//! - predicate true, debounce 0 → ACTIVATED, fire
//! - predicate true, IDLE, debounce > 0 → PENDING since now
//! - predicate true, PENDING, now - since > debounce → ACTIVATED, fire

use crate::core::{ActionDispatcher, DiagnosticSink};
use crate::types::{
    AdvancedBinding, Binding, Diagnostic, EdgeKind, EdgeRule, EdgeState, ReasonCode,
    ScoreVector, SimpleBinding, TransitionEvent,
};

/// Outcome of one edge rule step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStep {
    /// Nothing changed
    Held,
    /// Debounce window opened
    Pending,
    /// Rule asserted; the caller fires the action exactly once
    Activated,
    /// Predicate released from PENDING or ACTIVATED
    Released,
}

/// Advance an edge rule given this frame's predicate result
pub fn step_edge(rule: &mut EdgeRule, predicate_true: bool, now_ms: f64) -> EdgeStep {
    if !predicate_true {
        let was = rule.state();
        rule.reset_runtime(false);
        return if was == EdgeState::Idle { EdgeStep::Held } else { EdgeStep::Released };
    }

    if rule.activated {
        return EdgeStep::Held;
    }

    if rule.debounce_ms == 0 {
        rule.activated = true;
        rule.pending_since_ms = None;
        return EdgeStep::Activated;
    }

    match rule.pending_since_ms {
        None => {
            rule.pending_since_ms = Some(now_ms);
            EdgeStep::Pending
        }
        Some(since) if now_ms - since > rule.debounce_ms as f64 => {
            rule.activated = true;
            rule.pending_since_ms = None;
            EdgeStep::Activated
        }
        Some(_) => EdgeStep::Held,
    }
}

/// Advance a simple binding; returns the edge whose action fires, if any
pub fn step_simple(binding: &mut SimpleBinding, score: Option<u8>) -> Option<EdgeKind> {
    // A blendshape the frame does not carry compares neither way
    let score = score?;
    if !binding.activated && score > binding.threshold {
        binding.activated = true;
        Some(EdgeKind::Start)
    } else if binding.activated && score < binding.threshold {
        binding.activated = false;
        Some(EdgeKind::Stop)
    } else {
        None
    }
}

/// Evaluates bindings for one frame, dispatching on every firing edge
pub struct BindingEvaluator<'a> {
    dispatcher: &'a dyn ActionDispatcher,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> BindingEvaluator<'a> {
    pub fn new(dispatcher: &'a dyn ActionDispatcher, sink: &'a dyn DiagnosticSink) -> Self {
        Self { dispatcher, sink }
    }

    /// Evaluate bindings in declaration order
    pub fn process(&self, bindings: &mut [Binding], scores: &ScoreVector, now_ms: f64) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        for (index, binding) in bindings.iter_mut().enumerate() {
            match binding {
                Binding::Simple(simple) => self.process_simple(index, simple, scores, now_ms, &mut events),
                Binding::Advanced(advanced) => self.process_advanced(index, advanced, scores, now_ms, &mut events),
            }
        }
        events
    }

    fn process_simple(
        &self,
        index: usize,
        binding: &mut SimpleBinding,
        scores: &ScoreVector,
        now_ms: f64,
        events: &mut Vec<TransitionEvent>,
    ) {
        let score = scores.get(&binding.blendshape);
        let Some(edge) = step_simple(binding, score) else {
            return;
        };
        let (reason, token) = match edge {
            EdgeKind::Start => (ReasonCode::R201_SIMPLE_START, &binding.actions.start),
            EdgeKind::Stop => (ReasonCode::R202_SIMPLE_STOP, &binding.actions.stop),
        };
        let mut event = TransitionEvent::new(now_ms, index, edge, reason);
        self.fire(&mut event, token);
        events.push(event);
    }

    fn process_advanced(
        &self,
        index: usize,
        binding: &mut AdvancedBinding,
        scores: &ScoreVector,
        now_ms: f64,
        events: &mut Vec<TransitionEvent>,
    ) {
        for edge in [EdgeKind::Start, EdgeKind::Stop] {
            let rule = binding.edge_mut(edge);
            let holds = self.evaluate_rule(index, edge, rule, scores);

            let reason = match step_edge(rule, holds, now_ms) {
                EdgeStep::Held => continue,
                EdgeStep::Pending => ReasonCode::R203_EDGE_PENDING,
                EdgeStep::Released => ReasonCode::R205_EDGE_RELEASED,
                EdgeStep::Activated => ReasonCode::R204_EDGE_ACTIVATED,
            };

            let mut event = TransitionEvent::new(now_ms, index, edge, reason);
            if reason == ReasonCode::R204_EDGE_ACTIVATED {
                self.fire(&mut event, &rule.action);
            }
            events.push(event);
        }
    }

    /// Predicate result for this frame; null predicates and eval errors are false
    fn evaluate_rule(&self, index: usize, edge: EdgeKind, rule: &EdgeRule, scores: &ScoreVector) -> bool {
        let Some(predicate) = rule.predicate() else {
            return false;
        };
        match predicate.evaluate(scores) {
            Ok(holds) => holds,
            Err(err) => {
                self.sink.report(Diagnostic::new(
                    ReasonCode::R102_EVAL_FAILED,
                    subject(index, edge),
                    format!("'{}': {}", rule.logic, err),
                ));
                false
            }
        }
    }

    /// Exactly one dispatch per firing transition; failures never roll back
    fn fire(&self, event: &mut TransitionEvent, token: &str) {
        event.action = Some(token.to_string());
        if let Err(err) = self.dispatcher.dispatch(token) {
            self.sink.report(Diagnostic::new(
                ReasonCode::R103_DISPATCH_FAILED,
                subject(event.binding, event.edge),
                err.to_string(),
            ));
            event.error = Some(err.to_string());
        }
    }
}

/// Human-readable name of one binding edge
pub fn subject(index: usize, edge: EdgeKind) -> String {
    format!("binding #{} {}", index, edge)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CollectingSink, RecordingDispatcher};

    fn rule(debounce_ms: u64) -> EdgeRule {
        EdgeRule::new("x", debounce_ms, "key:a")
    }

    #[test]
    fn test_edge_immediate_without_debounce() {
        let mut r = rule(0);
        assert_eq!(step_edge(&mut r, true, 10.0), EdgeStep::Activated);
        assert_eq!(r.state(), EdgeState::Activated);
        assert_eq!(step_edge(&mut r, true, 20.0), EdgeStep::Held);
        assert_eq!(step_edge(&mut r, false, 30.0), EdgeStep::Released);
        assert_eq!(r.state(), EdgeState::Idle);
        assert_eq!(step_edge(&mut r, false, 40.0), EdgeStep::Held);
    }

    #[test]
    fn test_edge_debounce_window() {
        let mut r = rule(200);
        assert_eq!(step_edge(&mut r, true, 0.0), EdgeStep::Pending);
        assert_eq!(r.pending_since_ms(), Some(0.0));
        assert_eq!(step_edge(&mut r, true, 100.0), EdgeStep::Held);
        assert_eq!(step_edge(&mut r, true, 200.0), EdgeStep::Held);
        assert_eq!(step_edge(&mut r, true, 250.0), EdgeStep::Activated);
        assert_eq!(r.pending_since_ms(), None);
    }

    #[test]
    fn test_edge_release_discards_window() {
        let mut r = rule(200);
        step_edge(&mut r, true, 0.0);
        assert_eq!(step_edge(&mut r, false, 50.0), EdgeStep::Released);
        assert_eq!(r.pending_since_ms(), None);
        assert_eq!(step_edge(&mut r, true, 60.0), EdgeStep::Pending);
        assert_eq!(r.pending_since_ms(), Some(60.0));
        assert_eq!(step_edge(&mut r, true, 260.0), EdgeStep::Held);
        assert_eq!(step_edge(&mut r, true, 260.5), EdgeStep::Activated);
    }

    #[test]
    fn test_simple_threshold_crossing() {
        let mut b = SimpleBinding::new("jawOpen", 50, "down:a", "up:a");
        assert_eq!(step_simple(&mut b, Some(40)), None);
        assert_eq!(step_simple(&mut b, Some(60)), Some(EdgeKind::Start));
        assert_eq!(step_simple(&mut b, Some(50)), None);
        assert!(b.activated());
        assert_eq!(step_simple(&mut b, Some(40)), Some(EdgeKind::Stop));
        assert!(!b.activated());
    }

    #[test]
    fn test_simple_equal_never_transitions() {
        for threshold in [0u8, 1, 50, 99, 100] {
            for start_activated in [false, true] {
                let mut b = SimpleBinding::new("jawOpen", threshold, "", "");
                b.activated = start_activated;
                assert_eq!(step_simple(&mut b, Some(threshold)), None);
                assert_eq!(b.activated(), start_activated);
            }
        }
    }

    #[test]
    fn test_simple_missing_score_holds() {
        let mut b = SimpleBinding::new("jawOpen", 50, "", "");
        assert_eq!(step_simple(&mut b, None), None);
        b.activated = true;
        assert_eq!(step_simple(&mut b, None), None);
        assert!(b.activated());
    }

    #[test]
    fn test_null_predicate_never_fires() {
        let dispatcher = RecordingDispatcher::new();
        let sink = CollectingSink::new();
        let evaluator = BindingEvaluator::new(&dispatcher, &sink);
        let mut bindings = vec![Binding::Advanced(AdvancedBinding::new(rule(0), rule(0)))];

        for t in 0..10 {
            let events = evaluator.process(&mut bindings, &ScoreVector::new(), t as f64 * 16.0);
            assert!(events.is_empty());
        }
        assert!(dispatcher.calls().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_dispatch_failure_keeps_transition() {
        let dispatcher = RecordingDispatcher::rejecting("down:a");
        let sink = CollectingSink::new();
        let evaluator = BindingEvaluator::new(&dispatcher, &sink);
        let mut bindings = vec![Binding::Simple(SimpleBinding::new("jawOpen", 50, "down:a", "up:a"))];

        let scores = ScoreVector::new().with("jawOpen", 70);
        let events = evaluator.process(&mut bindings, &scores, 0.0);
        assert_eq!(events.len(), 1);
        assert!(events[0].error.is_some());
        assert!(bindings[0].as_simple().unwrap().activated());
        assert_eq!(sink.codes(), vec![ReasonCode::R103_DISPATCH_FAILED]);

        // No retry on the next frame
        evaluator.process(&mut bindings, &scores, 16.0);
        assert_eq!(dispatcher.calls(), vec!["down:a".to_string()]);
    }
}
