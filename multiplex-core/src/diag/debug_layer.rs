//! Ring-buffer debug log capture, used by tests to assert the lifecycle
//! lines the runtime emits via `tracing`.
//!
//! Ported from `diag.DebugLogger`, which stored the last *N* formatted
//! messages in a `container/ring`. Re-grounded on `tracing_subscriber::Layer`
//! since `tracing` (not a bespoke `Logger` trait) is this crate's actual
//! logging entry point — see SPEC_FULL.md §6, §10.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub time: SystemTime,
    pub level: Level,
    pub message: String,
}

/// Captures up to `capacity` events, oldest overwritten first.
pub struct DebugLayer {
    capacity: usize,
    cache: Mutex<VecDeque<CapturedEvent>>,
}

impl DebugLayer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cache: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Most recent captured event, if any.
    pub fn last(&self) -> Option<CapturedEvent> {
        self.cache.lock().unwrap().back().cloned()
    }

    pub fn last_message(&self) -> String {
        self.last().map(|e| e.message).unwrap_or_default()
    }

    /// All captured events, oldest first.
    pub fn all(&self) -> Vec<CapturedEvent> {
        self.cache.lock().unwrap().iter().cloned().collect()
    }

    pub fn all_messages(&self) -> Vec<String> {
        self.all().into_iter().map(|e| e.message).collect()
    }

    /// All captured events, newest first.
    pub fn all_reverse(&self) -> Vec<CapturedEvent> {
        self.cache.lock().unwrap().iter().rev().cloned().collect()
    }

    pub fn all_messages_reverse(&self) -> Vec<String> {
        self.all_reverse().into_iter().map(|e| e.message).collect()
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for DebugLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let captured = CapturedEvent {
            time: SystemTime::now(),
            level: *event.metadata().level(),
            message: visitor.message,
        };

        let mut cache = self.cache.lock().unwrap();
        if cache.len() == self.capacity {
            cache.pop_front();
        }
        cache.push_back(captured);
    }
}
