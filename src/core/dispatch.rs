//! Action dispatchers: the sink transitions fire into
//!
//! `dispatch` must return promptly. Implementations hand the token off
//! (log line, channel send) and never wait for the actuator.

use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};
use crate::types::{ActionStep, ActionToken, DispatchError};

/// Executes a named action token
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, token: &str) -> Result<(), DispatchError>;
}

/// A dispatched action as published to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    pub timestamp: DateTime<Utc>,
    pub token: String,
    pub steps: Vec<ActionStep>,
}

impl ActionEvent {
    fn from_token(token: ActionToken) -> Self {
        Self {
            timestamp: Utc::now(),
            token: token.raw,
            steps: token.steps,
        }
    }
}

// =============================================================================
// CONSOLE
// =============================================================================

/// Parses the token and logs the steps it would perform
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDispatcher;

impl ActionDispatcher for ConsoleDispatcher {
    fn dispatch(&self, token: &str) -> Result<(), DispatchError> {
        let parsed = ActionToken::parse(token)?;
        if parsed.is_noop() {
            debug!("empty action token, nothing to do");
            return Ok(());
        }
        let steps: Vec<String> = parsed.steps.iter().map(ToString::to_string).collect();
        info!(token = %parsed.raw, "action: {}", steps.join(" → "));
        Ok(())
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Publishes parsed actions to every subscriber (WebSocket clients)
#[derive(Debug, Clone)]
pub struct BroadcastDispatcher {
    tx: broadcast::Sender<ActionEvent>,
}

impl BroadcastDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.tx.subscribe()
    }
}

impl ActionDispatcher for BroadcastDispatcher {
    fn dispatch(&self, token: &str) -> Result<(), DispatchError> {
        let parsed = ActionToken::parse(token)?;
        if parsed.is_noop() {
            return Ok(());
        }
        // No subscriber is not a failure: nobody is listening yet
        if self.tx.send(ActionEvent::from_token(parsed)).is_err() {
            debug!(token, "no action subscribers");
        }
        Ok(())
    }
}

// =============================================================================
// GATE
// =============================================================================

/// Honours the "allow input simulation" setting
pub struct GatedDispatcher {
    inner: Arc<dyn ActionDispatcher>,
    allow: bool,
}

impl GatedDispatcher {
    pub fn new(inner: Arc<dyn ActionDispatcher>, allow: bool) -> Self {
        Self { inner, allow }
    }
}

impl ActionDispatcher for GatedDispatcher {
    fn dispatch(&self, token: &str) -> Result<(), DispatchError> {
        if !self.allow {
            debug!(token, "input simulation disabled, action swallowed");
            return Ok(());
        }
        self.inner.dispatch(token)
    }
}

// =============================================================================
// RECORDING
// =============================================================================

/// Records every token; optionally rejects one of them
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<String>>,
    reject: Option<String>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record everything, but fail whenever `token` is dispatched
    pub fn rejecting(token: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject: Some(token.into()),
        }
    }

    /// Tokens dispatched so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn dispatch(&self, token: &str) -> Result<(), DispatchError> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(token.to_string());
        match self.reject {
            Some(ref rejected) if rejected == token => Err(DispatchError::Rejected {
                token: token.to_string(),
                reason: "rejected by test actuator".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_rejects_malformed() {
        let dispatcher = ConsoleDispatcher;
        assert!(dispatcher.dispatch("key:space").is_ok());
        assert!(dispatcher.dispatch("").is_ok());
        assert!(matches!(
            dispatcher.dispatch("warp:9"),
            Err(DispatchError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_broadcast_reaches_subscriber() {
        let dispatcher = BroadcastDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        dispatcher.dispatch("down:shift;key:a").unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.token, "down:shift;key:a");
        assert_eq!(event.steps.len(), 2);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_ok() {
        let dispatcher = BroadcastDispatcher::new(8);
        assert!(dispatcher.dispatch("key:a").is_ok());
    }

    #[test]
    fn test_gate_swallows_when_disabled() {
        let recorder = Arc::new(RecordingDispatcher::new());
        let gated = GatedDispatcher::new(recorder.clone(), false);
        gated.dispatch("key:a").unwrap();
        assert!(recorder.calls().is_empty());

        let gated = GatedDispatcher::new(recorder.clone(), true);
        gated.dispatch("key:a").unwrap();
        assert_eq!(recorder.calls(), vec!["key:a".to_string()]);
    }

    #[test]
    fn test_recording_rejects_configured_token() {
        let recorder = RecordingDispatcher::rejecting("key:x");
        assert!(recorder.dispatch("key:a").is_ok());
        assert!(recorder.dispatch("key:x").is_err());
        assert_eq!(recorder.calls(), vec!["key:a".to_string(), "key:x".to_string()]);
    }
}
