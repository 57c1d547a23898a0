//! Reporter sinks for batch events
//!
//! [`TracingReporter`] turns events into log lines. [`forward_json_events`]
//! is the bridge task behind `--events-json`: it drains an [`EventBus`]
//! subscription and writes one JSON object per line.

use std::io::Write;
use tokio::sync::broadcast;
use voxprep_common::{BatchEvent, BatchReporter, EventBus, OutcomeKind};

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl BatchReporter for TracingReporter {
    fn report(&self, event: BatchEvent) {
        match event {
            BatchEvent::BatchStarted {
                run_id, kind, total, ..
            } => {
                tracing::debug!(run_id = %run_id, batch = %kind, total, "Dispatch starting");
            }
            BatchEvent::ItemStarted {
                run_id,
                index,
                total,
                item,
                ..
            } => {
                tracing::debug!(run_id = %run_id, item = %item, "Item {}/{} started", index + 1, total);
            }
            BatchEvent::RetryScheduled {
                run_id,
                item,
                attempt,
                max_attempts,
                delay_ms,
                ..
            } => {
                tracing::debug!(
                    run_id = %run_id,
                    item = %item,
                    attempt,
                    max_attempts,
                    delay_ms,
                    "Retry scheduled"
                );
            }
            BatchEvent::ItemFinished {
                run_id,
                item,
                outcome,
                detail,
                completed,
                total,
                ..
            } => match outcome {
                OutcomeKind::Failed => tracing::warn!(
                    run_id = %run_id,
                    item = %item,
                    reason = detail.as_deref().unwrap_or(""),
                    "[{}/{}] failed",
                    completed,
                    total
                ),
                _ => tracing::info!(
                    run_id = %run_id,
                    item = %item,
                    outcome = ?outcome,
                    "[{}/{}] done",
                    completed,
                    total
                ),
            },
            BatchEvent::BatchFinished {
                run_id, kind, summary, ..
            } => {
                for line in summary.render(kind) {
                    tracing::info!(run_id = %run_id, "{}", line);
                }
            }
        }
    }
}

/// Write each event from `bus` to `out` as one JSON line until the bus closes
///
/// Returns the number of events written.
pub async fn forward_json_events<W: Write>(mut rx: broadcast::Receiver<BatchEvent>, mut out: W) -> usize {
    let mut written = 0;
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    if let Err(e) = writeln!(out, "{}", json).and_then(|_| out.flush()) {
                        tracing::error!(error = %e, "Failed to write event, stopping event output");
                        break;
                    }
                    written += 1;
                }
                Err(e) => tracing::error!(error = %e, "Failed to serialize event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event output lagging, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    written
}

/// Convenience: subscribe to `bus` and forward to stdout
pub fn spawn_stdout_forwarder(bus: &EventBus) -> tokio::task::JoinHandle<usize> {
    let rx = bus.subscribe();
    tokio::spawn(async move { forward_json_events(rx, std::io::stdout()).await })
}
