//! Output structures: transitions, frame reports and diagnostics

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use crate::types::{EdgeKind, ReasonCode};

/// One state change of one binding edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Frame timestamp (milliseconds)
    pub frame_ms: f64,
    /// Index of the binding inside its profile
    pub binding: usize,
    pub edge: EdgeKind,
    pub reason: ReasonCode,
    /// Token handed to the dispatcher, `None` when nothing fired
    pub action: Option<String>,
    /// Dispatcher failure, if any (the transition stands regardless)
    pub error: Option<String>,
}

impl TransitionEvent {
    pub fn new(frame_ms: f64, binding: usize, edge: EdgeKind, reason: ReasonCode) -> Self {
        Self { frame_ms, binding, edge, reason, action: None, error: None }
    }

    /// Did this transition call the dispatcher?
    pub fn fired(&self) -> bool {
        self.action.is_some()
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let head = format!("t={:.1}ms | #{} {}", self.frame_ms, self.binding, self.edge);
        let body = match (&self.action, &self.error) {
            (Some(action), None) => format!("{} '{}'", "fire".green().bold(), action),
            (Some(action), Some(err)) => format!("{} '{}' ({})", "fail".red().bold(), action, err),
            (None, _) => self.reason.description().dimmed().to_string(),
        };
        format!("{} | {} | {}", head, body, self.reason.code().dimmed())
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "t={:.1} | binding={} | edge={} | action={} | reason={}",
            self.frame_ms,
            self.binding,
            self.edge,
            self.action.as_deref().unwrap_or("-"),
            self.reason.code()
        )
    }
}

/// What happened to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameStatus {
    /// Bindings of the selected profile were evaluated
    Evaluated,
    /// Profile set is empty
    NoProfile,
    /// Detector saw no face
    NoFace,
    /// Detector failed for this frame
    DetectorFailed,
}

/// Result of processing one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameReport {
    pub timestamp: DateTime<Utc>,
    pub frame_ms: f64,
    pub status: FrameStatus,
    /// Name of the evaluated profile
    pub profile: Option<String>,
    pub transitions: Vec<TransitionEvent>,
}

impl FrameReport {
    pub fn skipped(frame_ms: f64, status: FrameStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            frame_ms,
            status,
            profile: None,
            transitions: Vec::new(),
        }
    }

    pub fn evaluated(frame_ms: f64, profile: &str, transitions: Vec<TransitionEvent>) -> Self {
        Self {
            timestamp: Utc::now(),
            frame_ms,
            status: FrameStatus::Evaluated,
            profile: Some(profile.to_string()),
            transitions,
        }
    }

    /// Transitions that called the dispatcher
    pub fn fired(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.transitions.iter().filter(|t| t.fired())
    }
}

/// Developer-facing report of a contained failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub timestamp: DateTime<Utc>,
    pub code: ReasonCode,
    /// What failed, e.g. "binding #2 start"
    pub subject: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(code: ReasonCode, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            code,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!("{} | {} | {}", self.code.code(), self.subject, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parseable_transition() {
        let mut event = TransitionEvent::new(250.0, 1, EdgeKind::Start, ReasonCode::R204_EDGE_ACTIVATED);
        event.action = Some("key:space".into());
        let line = event.to_parseable_string();
        assert!(line.contains("t=250.0"));
        assert!(line.contains("binding=1"));
        assert!(line.contains("edge=start"));
        assert!(line.contains("action=key:space"));
        assert!(line.contains("reason=R204_EDGE_ACTIVATED"));
    }

    #[test]
    fn test_unfired_transition() {
        let event = TransitionEvent::new(10.0, 0, EdgeKind::Stop, ReasonCode::R203_EDGE_PENDING);
        assert!(!event.fired());
        assert!(event.to_parseable_string().contains("action=-"));
    }

    #[test]
    fn test_skipped_report_has_no_transitions() {
        let report = FrameReport::skipped(5.0, FrameStatus::NoFace);
        assert_eq!(report.status, FrameStatus::NoFace);
        assert_eq!(report.fired().count(), 0);
        assert!(report.profile.is_none());
    }
}
