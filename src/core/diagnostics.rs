//! Diagnostic sinks: where contained failures are reported
//!
//! The evaluator never logs on its own; it hands every compile, eval,
//! dispatch and detector failure to the sink it was given.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;
use crate::types::{Diagnostic, ReasonCode};

/// Receives diagnostics from the engine
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Writes diagnostics to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        warn!(
            code = diagnostic.code.code(),
            subject = %diagnostic.subject,
            "{}",
            diagnostic.detail
        );
    }
}

/// Keeps diagnostics in memory (tests, `--check`, the HTTP API)
///
/// A bounded sink keeps only the newest `capacity` entries; a rule that
/// fails on every frame must not grow it without limit.
#[derive(Debug, Default)]
pub struct CollectingSink {
    items: Mutex<VecDeque<Diagnostic>>,
    capacity: Option<usize>,
    dropped: AtomicUsize,
}

impl CollectingSink {
    /// Unbounded
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` diagnostics, dropping the oldest
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Remove and return everything collected so far
    pub fn take(&self) -> Vec<Diagnostic> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.drain(..).collect()
    }

    /// Diagnostics discarded because the sink was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Codes collected so far, oldest first
    pub fn codes(&self) -> Vec<ReasonCode> {
        self.items.lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|d| d.code)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            if items.len() >= capacity {
                items.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        items.push_back(diagnostic);
    }
}

/// Forwards every diagnostic to two sinks
pub struct TeeSink {
    first: Arc<dyn DiagnosticSink>,
    second: Arc<dyn DiagnosticSink>,
}

impl TeeSink {
    pub fn new(first: Arc<dyn DiagnosticSink>, second: Arc<dyn DiagnosticSink>) -> Self {
        Self { first, second }
    }
}

impl DiagnosticSink for TeeSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.first.report(diagnostic.clone());
        self.second.report(diagnostic);
    }
}
