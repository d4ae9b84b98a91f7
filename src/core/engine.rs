//! Binding engine: compiles rules and runs the per-frame cycle
//!
//! Owns the three collaborators (compiler, dispatcher, diagnostic sink).
//! The profile set and the selected index are passed in on every call.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::SCORE_MAX;
use crate::core::evaluator::subject;
use crate::core::{
    ActionDispatcher, BindingEvaluator, DiagnosticSink, ExpressionCompiler, LogicCompiler,
    TracingSink,
};
use crate::types::{
    Binding, DetectorError, DetectorFrame, Diagnostic, EdgeKind, EdgeRule, FrameReport,
    FrameStatus, ProfileError, ProfileSet, ReasonCode, ScoreVector, is_known_blendshape,
};

/// Partial update of one binding; absent fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingEdit {
    pub simplified: Option<bool>,
    pub blendshape: Option<String>,
    pub threshold: Option<u8>,
    pub start_action: Option<String>,
    pub stop_action: Option<String>,
    pub start_logic: Option<String>,
    pub stop_logic: Option<String>,
    pub start_debounce_ms: Option<u64>,
    pub stop_debounce_ms: Option<u64>,
}

/// Per-frame rule engine
pub struct BindingEngine {
    compiler: Arc<dyn LogicCompiler>,
    dispatcher: Arc<dyn ActionDispatcher>,
    sink: Arc<dyn DiagnosticSink>,
}

impl BindingEngine {
    pub fn new(
        compiler: Arc<dyn LogicCompiler>,
        dispatcher: Arc<dyn ActionDispatcher>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self { compiler, dispatcher, sink }
    }

    /// Expression compiler and tracing diagnostics around the given dispatcher
    pub fn with_dispatcher(dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self::new(Arc::new(ExpressionCompiler::new()), dispatcher, Arc::new(TracingSink))
    }

    // =========================================================================
    // COMPILATION
    // =========================================================================

    /// (Re)compile a rule's expression.
    ///
    /// Empty source disables the rule silently. A compile failure disables it
    /// and is reported; it never propagates.
    pub fn compile_rule(&self, rule: &mut EdgeRule, subject: &str) {
        rule.compiled = None;
        if rule.logic.trim().is_empty() {
            return;
        }

        match self.compiler.compile(&rule.logic) {
            Ok(predicate) => {
                for name in predicate.variables() {
                    if !is_known_blendshape(&name) {
                        self.sink.report(Diagnostic::new(
                            ReasonCode::R104_UNKNOWN_BLENDSHAPE,
                            subject,
                            format!("'{}' in '{}'", name, rule.logic),
                        ));
                    }
                }
                rule.compiled = Some(predicate);
            }
            Err(err) => {
                self.sink.report(Diagnostic::new(
                    ReasonCode::R101_COMPILE_FAILED,
                    subject,
                    format!("'{}': {}", rule.logic, err),
                ));
            }
        }
    }

    fn compile_binding(&self, binding: &mut Binding, index: usize) {
        if let Some(advanced) = binding.as_advanced_mut() {
            for edge in [EdgeKind::Start, EdgeKind::Stop] {
                self.compile_rule(advanced.edge_mut(edge), &subject(index, edge));
            }
        }
    }

    /// Load-time normalization: reset every run-time field and recompile
    /// every expression. Idempotent.
    pub fn normalize(&self, set: &mut ProfileSet) {
        set.clamp_selection();
        for profile in set.profiles.iter_mut() {
            for (index, binding) in profile.bindings.iter_mut().enumerate() {
                binding.reset_runtime();
                self.compile_binding(binding, index);
            }
        }
    }

    /// Replace a rule's expression and recompile it. Run-time state is kept.
    pub fn set_logic(&self, rule: &mut EdgeRule, source: impl Into<String>, subject: &str) {
        rule.logic = source.into();
        self.compile_rule(rule, subject);
    }

    /// Apply a user edit to one binding, recompiling what changed
    pub fn edit_binding(
        &self,
        set: &mut ProfileSet,
        profile: usize,
        index: usize,
        edit: BindingEdit,
    ) -> Result<(), ProfileError> {
        if let Some(threshold) = edit.threshold {
            if threshold > SCORE_MAX {
                return Err(ProfileError::ThresholdOutOfRange {
                    profile: set.profile(profile)?.name.clone(),
                    binding: index,
                    threshold,
                });
            }
        }

        let binding = set.binding_mut(profile, index)?;
        if let Some(simplified) = edit.simplified {
            let switched = binding.simplified() != simplified;
            binding.set_simplified(simplified);
            if switched {
                self.compile_binding(binding, index);
            }
        }

        match binding {
            Binding::Simple(simple) => {
                if let Some(blendshape) = edit.blendshape {
                    simple.blendshape = blendshape;
                }
                if let Some(threshold) = edit.threshold {
                    simple.threshold = threshold;
                }
                if let Some(start) = edit.start_action {
                    simple.actions.start = start;
                }
                if let Some(stop) = edit.stop_action {
                    simple.actions.stop = stop;
                }
            }
            Binding::Advanced(advanced) => {
                let edits = [
                    (EdgeKind::Start, edit.start_logic, edit.start_debounce_ms, edit.start_action),
                    (EdgeKind::Stop, edit.stop_logic, edit.stop_debounce_ms, edit.stop_action),
                ];
                for (edge, logic, debounce_ms, action) in edits {
                    let rule = advanced.edge_mut(edge);
                    if let Some(debounce_ms) = debounce_ms {
                        rule.debounce_ms = debounce_ms;
                    }
                    if let Some(action) = action {
                        rule.action = action;
                    }
                    if let Some(logic) = logic {
                        self.set_logic(rule, logic, &subject(index, edge));
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // FRAMES
    // =========================================================================

    /// Evaluate the selected profile against one frame of scores
    pub fn evaluate_scores(
        &self,
        set: &mut ProfileSet,
        selection: usize,
        scores: &ScoreVector,
        now_ms: f64,
    ) -> FrameReport {
        let Ok(profile) = set.profile_mut(selection) else {
            return FrameReport::skipped(now_ms, FrameStatus::NoProfile);
        };
        let evaluator = BindingEvaluator::new(self.dispatcher.as_ref(), self.sink.as_ref());
        let transitions = evaluator.process(&mut profile.bindings, scores, now_ms);
        FrameReport::evaluated(now_ms, &profile.name, transitions)
    }

    /// Full cycle for one detector frame. Detector failures skip the frame.
    pub fn process_frame(&self, set: &mut ProfileSet, selection: usize, frame: &DetectorFrame) -> FrameReport {
        match frame.scores() {
            Ok(Some(scores)) => self.evaluate_scores(set, selection, &scores, frame.timestamp_ms),
            Ok(None) => FrameReport::skipped(frame.timestamp_ms, FrameStatus::NoFace),
            Err(err) => {
                self.report_detector_error(&err, frame.timestamp_ms);
                FrameReport::skipped(frame.timestamp_ms, FrameStatus::DetectorFailed)
            }
        }
    }

    /// Parse and process one line of detector output
    pub fn process_line(&self, set: &mut ProfileSet, selection: usize, line: &str) -> FrameReport {
        match DetectorFrame::from_json(line) {
            Ok(frame) => self.process_frame(set, selection, &frame),
            Err(err) => {
                self.report_detector_error(&err, 0.0);
                FrameReport::skipped(0.0, FrameStatus::DetectorFailed)
            }
        }
    }

    fn report_detector_error(&self, err: &DetectorError, frame_ms: f64) {
        self.sink.report(Diagnostic::new(
            ReasonCode::R105_DETECTOR_FAILED,
            format!("frame t={:.1}ms", frame_ms),
            err.to_string(),
        ));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CollectingSink, FlagCompiler, RecordingDispatcher};
    use crate::types::{AdvancedBinding, EdgeState, Profile, SimpleBinding};

    struct Fixture {
        compiler: Arc<FlagCompiler>,
        dispatcher: Arc<RecordingDispatcher>,
        sink: Arc<CollectingSink>,
        engine: BindingEngine,
    }

    fn fixture() -> Fixture {
        let compiler = Arc::new(FlagCompiler::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let sink = Arc::new(CollectingSink::new());
        let engine = BindingEngine::new(compiler.clone(), dispatcher.clone(), sink.clone());
        Fixture { compiler, dispatcher, sink, engine }
    }

    fn advanced_set(start: &str, stop: &str) -> ProfileSet {
        ProfileSet::from_profiles(vec![Profile::with_bindings(
            "p",
            vec![Binding::Advanced(AdvancedBinding::new(
                EdgeRule::new(start, 0, "down:a"),
                EdgeRule::new(stop, 0, "up:a"),
            ))],
        )])
    }

    #[test]
    fn test_normalize_compiles_and_resets() {
        let f = fixture();
        let mut set = advanced_set("smile", "");
        f.engine.normalize(&mut set);

        let adv = set.profiles[0].bindings[0].as_advanced().unwrap();
        assert!(adv.start.is_compiled());
        assert!(!adv.stop.is_compiled());
        assert_eq!(adv.start.state(), EdgeState::Idle);
        assert_eq!(adv.stop.state(), EdgeState::Activated);
        assert!(f.sink.is_empty());
    }

    #[test]
    fn test_compile_failure_reported_not_raised() {
        let f = fixture();
        let mut set = advanced_set("!broken", "");
        f.engine.normalize(&mut set);

        let adv = set.profiles[0].bindings[0].as_advanced().unwrap();
        assert!(!adv.start.is_compiled());
        assert_eq!(f.sink.codes(), vec![ReasonCode::R101_COMPILE_FAILED]);
    }

    #[test]
    fn test_unknown_blendshape_warning() {
        let sink = Arc::new(CollectingSink::new());
        let engine = BindingEngine::new(
            Arc::new(ExpressionCompiler::new()),
            Arc::new(RecordingDispatcher::new()),
            sink.clone(),
        );
        let mut set = advanced_set("jawOpen > 10 and smileWide > 10", "");
        engine.normalize(&mut set);
        assert!(set.profiles[0].bindings[0].as_advanced().unwrap().start.is_compiled());
        assert_eq!(sink.codes(), vec![ReasonCode::R104_UNKNOWN_BLENDSHAPE]);
    }

    #[test]
    fn test_empty_profile_set_skips() {
        let f = fixture();
        let mut set = ProfileSet::new();
        let report = f.engine.evaluate_scores(&mut set, 0, &ScoreVector::new(), 0.0);
        assert_eq!(report.status, FrameStatus::NoProfile);
        assert!(f.dispatcher.calls().is_empty());
    }

    #[test]
    fn test_only_selected_profile_runs() {
        let f = fixture();
        let mut set = ProfileSet::from_profiles(vec![
            Profile::with_bindings("a", vec![Binding::Simple(SimpleBinding::new("jawOpen", 50, "key:a", ""))]),
            Profile::with_bindings("b", vec![Binding::Simple(SimpleBinding::new("jawOpen", 50, "key:b", ""))]),
        ]);
        let scores = ScoreVector::new().with("jawOpen", 80);
        let report = f.engine.evaluate_scores(&mut set, 1, &scores, 0.0);
        assert_eq!(report.profile.as_deref(), Some("b"));
        assert_eq!(f.dispatcher.calls(), vec!["key:b".to_string()]);
        assert!(!set.profiles[0].bindings[0].as_simple().unwrap().activated());
    }

    #[test]
    fn test_edit_recompiles_logic() {
        let f = fixture();
        let mut set = advanced_set("", "");
        f.engine.normalize(&mut set);

        let edit = BindingEdit { start_logic: Some("blink".into()), start_debounce_ms: Some(120), ..Default::default() };
        f.engine.edit_binding(&mut set, 0, 0, edit).unwrap();
        let adv = set.profiles[0].bindings[0].as_advanced().unwrap();
        assert!(adv.start.is_compiled());
        assert_eq!(adv.start.debounce_ms, 120);

        f.compiler.set("blink", true);
        f.engine.evaluate_scores(&mut set, 0, &ScoreVector::new(), 0.0);
        f.engine.evaluate_scores(&mut set, 0, &ScoreVector::new(), 121.0);
        assert_eq!(f.dispatcher.calls(), vec!["down:a".to_string()]);
    }

    #[test]
    fn test_edit_rejects_threshold() {
        let f = fixture();
        let mut set = ProfileSet::new();
        set.create_profile("p");
        let edit = BindingEdit { threshold: Some(101), ..Default::default() };
        assert!(matches!(
            f.engine.edit_binding(&mut set, 0, 0, edit),
            Err(ProfileError::ThresholdOutOfRange { threshold: 101, .. })
        ));
        let edit = BindingEdit { threshold: Some(30), ..Default::default() };
        assert!(matches!(
            f.engine.edit_binding(&mut set, 0, 4, edit),
            Err(ProfileError::NoSuchBinding(4))
        ));
    }

    #[test]
    fn test_edit_switches_mode() {
        let f = fixture();
        let mut set = ProfileSet::new();
        set.create_profile("p");
        let edit = BindingEdit {
            simplified: Some(false),
            start_logic: Some("wink".into()),
            ..Default::default()
        };
        f.engine.edit_binding(&mut set, 0, 0, edit).unwrap();
        let adv = set.profiles[0].bindings[0].as_advanced().unwrap();
        assert!(adv.start.is_compiled());
        assert_eq!(adv.stop.state(), EdgeState::Activated);
    }

    #[test]
    fn test_detector_failure_skips_frame() {
        let f = fixture();
        let mut set = ProfileSet::new();
        set.create_profile("p");

        let report = f.engine.process_line(&mut set, 0, "{garbage");
        assert_eq!(report.status, FrameStatus::DetectorFailed);

        let report = f.engine.process_line(&mut set, 0, r#"{"timestampMs": 5.0, "error": "lost"}"#);
        assert_eq!(report.status, FrameStatus::DetectorFailed);
        assert_eq!(report.frame_ms, 5.0);

        let report = f.engine.process_line(&mut set, 0, r#"{"timestampMs": 6.0}"#);
        assert_eq!(report.status, FrameStatus::NoFace);

        assert_eq!(f.sink.codes(), vec![ReasonCode::R105_DETECTOR_FAILED, ReasonCode::R105_DETECTOR_FAILED]);
        assert!(f.dispatcher.calls().is_empty());
    }
}
