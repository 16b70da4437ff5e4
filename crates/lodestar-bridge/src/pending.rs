//! Bookkeeping for requests awaiting a correlated response.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;

struct PendingRequest {
    correlation_id: String,
    command: String,
    tx: oneshot::Sender<Value>,
    started_at: Instant,
}

/// Table of outstanding requests keyed by response event name.
///
/// An entry is removed exactly once: by `resolve` when the response arrives,
/// by `remove` when the request gives up, or by `drain` on teardown.
/// Dropping an entry drops its sender, which wakes the waiting request.
#[derive(Clone, Default)]
pub(crate) struct PendingRequests {
    table: Arc<Mutex<HashMap<String, PendingRequest>>>,
}

impl PendingRequests {
    /// Returns `None` if `response_event` is already pending.
    pub(crate) fn insert(
        &self,
        response_event: &str,
        correlation_id: &str,
        command: &str,
    ) -> Option<oneshot::Receiver<Value>> {
        let mut table = self.table.lock();
        match table.entry(response_event.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingRequest {
                    correlation_id: correlation_id.to_string(),
                    command: command.to_string(),
                    tx,
                    started_at: Instant::now(),
                });
                Some(rx)
            }
        }
    }

    /// Complete a pending request. Returns false if nothing was waiting.
    pub(crate) fn resolve(&self, response_event: &str, payload: Value) -> bool {
        let Some(pending) = self.table.lock().remove(response_event) else {
            trace!(response_event, "response without pending request ignored");
            return false;
        };
        trace!(
            command = %pending.command,
            correlation_id = %pending.correlation_id,
            elapsed_ms = pending.started_at.elapsed().as_millis() as u64,
            "resolving pending request"
        );
        // The receiver is gone only if the caller stopped waiting in the meantime.
        let _ = pending.tx.send(payload);
        true
    }

    pub(crate) fn remove(&self, response_event: &str) -> bool {
        self.table.lock().remove(response_event).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Drop every pending entry, returning how many there were.
    pub(crate) fn drain(&self) -> usize {
        let drained: Vec<_> = self.table.lock().drain().collect();
        drained.len()
    }
}
