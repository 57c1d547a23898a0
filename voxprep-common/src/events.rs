//! Event types for the voxprep batch reporter
//!
//! Engines never log progress through a process-wide logger. They receive a
//! [`BatchReporter`] and emit [`BatchEvent`]s through it; the binary decides
//! where events go (tracing, JSON lines, both).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Which batch pipeline produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Padding,
    Synthesis,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Padding => write!(f, "padding"),
            BatchKind::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// Terminal classification of one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Succeeded,
    Skipped,
    Failed,
    /// Never started because the run was cancelled first
    NotDispatched,
}

/// One failed item in a batch summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureLine {
    /// Item label (file path or output name)
    pub item: String,
    /// Human-readable failure reason
    pub reason: String,
}

/// Per-batch outcome counts
///
/// `succeeded` includes `skipped`: an item that needed no work is a success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_dispatched: usize,
    pub cancelled: bool,
    pub failures: Vec<FailureLine>,
}

impl BatchSummary {
    /// Record one item outcome
    pub fn record(&mut self, item: &str, outcome: OutcomeKind, reason: Option<String>) {
        self.total += 1;
        match outcome {
            OutcomeKind::Succeeded => {
                self.attempted += 1;
                self.succeeded += 1;
            }
            OutcomeKind::Skipped => {
                self.attempted += 1;
                self.succeeded += 1;
                self.skipped += 1;
            }
            OutcomeKind::Failed => {
                self.attempted += 1;
                self.failed += 1;
                self.failures.push(FailureLine {
                    item: item.to_string(),
                    reason: reason.unwrap_or_else(|| "unknown failure".to_string()),
                });
            }
            OutcomeKind::NotDispatched => self.not_dispatched += 1,
        }
    }

    /// True when every dispatched item succeeded and nothing was cut short
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.not_dispatched == 0 && !self.cancelled
    }

    /// Terminal rendering: one `succeeded/attempted` line, then one line per failure
    pub fn render(&self, kind: BatchKind) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.failures.len() + 1);
        let mut head = format!(
            "{} finished: {}/{} succeeded",
            kind, self.succeeded, self.attempted
        );
        if self.skipped > 0 {
            head.push_str(&format!(" ({} skipped)", self.skipped));
        }
        if self.not_dispatched > 0 {
            head.push_str(&format!(", {} not dispatched", self.not_dispatched));
        }
        if self.cancelled {
            head.push_str(" [cancelled]");
        }
        lines.push(head);
        for failure in &self.failures {
            lines.push(format!("  FAILED {}: {}", failure.item, failure.reason));
        }
        lines
    }
}

/// Batch event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    /// Work list built and validated, dispatch about to begin
    BatchStarted {
        run_id: Uuid,
        kind: BatchKind,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A worker picked up an item
    ItemStarted {
        run_id: Uuid,
        index: usize,
        total: usize,
        item: String,
        timestamp: DateTime<Utc>,
    },

    /// A transient failure will be retried after `delay_ms`
    RetryScheduled {
        run_id: Uuid,
        item: String,
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// An item reached its terminal state
    ItemFinished {
        run_id: Uuid,
        item: String,
        outcome: OutcomeKind,
        detail: Option<String>,
        /// Items finished so far, this one included
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Batch done (or cancelled); carries the final counts
    BatchFinished {
        run_id: Uuid,
        kind: BatchKind,
        summary: BatchSummary,
        timestamp: DateTime<Utc>,
    },
}

/// Sink for batch events, injected into every engine
pub trait BatchReporter: Send + Sync {
    fn report(&self, event: BatchEvent);
}

/// Reporter that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl BatchReporter for NullReporter {
    fn report(&self, _event: BatchEvent) {}
}

/// Reporter forwarding each event to several reporters in order
pub struct FanoutReporter {
    sinks: Vec<std::sync::Arc<dyn BatchReporter>>,
}

impl FanoutReporter {
    pub fn new(sinks: Vec<std::sync::Arc<dyn BatchReporter>>) -> Self {
        Self { sinks }
    }
}

impl BatchReporter for FanoutReporter {
    fn report(&self, event: BatchEvent) {
        for sink in &self.sinks {
            sink.report(event.clone());
        }
    }
}

/// Broadcast event bus
///
/// Lagging subscribers lose the oldest events; the batch never waits on a
/// slow consumer.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BatchEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of subscribers that received the event; zero when
    /// nobody is listening.
    pub fn emit(&self, event: BatchEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl BatchReporter for EventBus {
    fn report(&self, event: BatchEvent) {
        self.emit(event);
    }
}
