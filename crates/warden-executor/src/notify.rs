//! Host-directed notifications and the unhandled-error path.
//!
//! Uncaught snap failures are not correlated with any single in-flight
//! command, so they reach the host as asynchronous notifications rather
//! than responses. Error sinks are *swapped, not stacked*: restarting a
//! snap id bumps that id's generation counter, and reports from sinks of
//! older generations are discarded so a stale context's late crash is
//! never misattributed to its successor. Generations are per snap id;
//! starting one snap never silences another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use warden_core::{JsonRpcNotification, SnapId};

/// Sends host-directed notifications.
///
/// Cloning is cheap; all clones feed the same receiver.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<JsonRpcNotification>,
}

impl Notifier {
    /// Create a notifier and the receiver the host transport drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JsonRpcNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send a notification. Silently dropped if the host hung up; the
    /// sandbox never fails because nobody is listening.
    pub fn notify(&self, notification: JsonRpcNotification) {
        let _ = self.tx.send(notification);
    }

    /// Report an error not correlated with any command.
    pub fn unhandled_error(&self, snap_id: &SnapId, error: Value) {
        self.notify(JsonRpcNotification::new(
            JsonRpcNotification::UNHANDLED_ERROR,
            Some(json!({ "snapId": snap_id, "error": error })),
        ));
    }

    /// Emit the bracket marker preceding an outbound call.
    pub fn outbound_request(&self, snap_id: &SnapId, method: &str) {
        self.notify(JsonRpcNotification::new(
            JsonRpcNotification::OUTBOUND_REQUEST,
            Some(json!({ "snapId": snap_id, "method": method })),
        ));
    }

    /// Emit the bracket marker following an outbound call.
    pub fn outbound_response(&self, snap_id: &SnapId, method: &str) {
        self.notify(JsonRpcNotification::new(
            JsonRpcNotification::OUTBOUND_RESPONSE,
            Some(json!({ "snapId": snap_id, "method": method })),
        ));
    }
}

/// A per-snap handle for reporting uncaught errors.
///
/// Minted by [`SinkRegistry::new_sink`]; only the most recently minted
/// sink for a given snap id is live.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    snap_id: SnapId,
    generation: u64,
    current: Arc<AtomicU64>,
    notifier: Notifier,
}

impl ErrorSink {
    /// Report an uncaught error from the snap's context.
    ///
    /// Reports from a superseded sink are dropped.
    pub fn report(&self, error: Value) {
        if self.current.load(Ordering::Acquire) == self.generation {
            self.notifier.unhandled_error(&self.snap_id, error);
        } else {
            debug!(
                snap_id = %self.snap_id,
                "Dropping unhandled error from a superseded snap context"
            );
        }
    }

    /// The snap this sink is attributed to.
    #[must_use]
    pub fn snap_id(&self) -> &SnapId {
        &self.snap_id
    }
}

/// Mints generation-swapped error sinks, one counter per snap id.
#[derive(Debug)]
pub(crate) struct SinkRegistry {
    generations: Mutex<HashMap<SnapId, Arc<AtomicU64>>>,
    notifier: Notifier,
}

impl SinkRegistry {
    pub(crate) fn new(notifier: Notifier) -> Self {
        Self {
            generations: Mutex::new(HashMap::new()),
            notifier,
        }
    }

    /// Mint the sink for a newly starting snap, superseding every prior
    /// sink of the *same* snap id in one step. Sinks of other snaps are
    /// untouched.
    pub(crate) fn new_sink(&self, snap_id: SnapId) -> ErrorSink {
        let current = {
            let mut generations = self
                .generations
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            Arc::clone(generations.entry(snap_id.clone()).or_default())
        };
        let generation = current.fetch_add(1, Ordering::AcqRel) + 1;
        ErrorSink {
            snap_id,
            generation,
            current,
            notifier: self.notifier.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: &str) -> SnapId {
        SnapId::new(id).unwrap()
    }

    #[tokio::test]
    async fn live_sink_reports_are_delivered() {
        let (notifier, mut rx) = Notifier::channel();
        let registry = SinkRegistry::new(notifier);
        let sink = registry.new_sink(snap("npm:one"));

        sink.report(json!({"message": "boom"}));
        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.method, JsonRpcNotification::UNHANDLED_ERROR);
        let params = notification.params.unwrap();
        assert_eq!(params["snapId"], json!("npm:one"));
    }

    #[tokio::test]
    async fn restarting_a_snap_supersedes_its_prior_sink() {
        let (notifier, mut rx) = Notifier::channel();
        let registry = SinkRegistry::new(notifier);
        let stale = registry.new_sink(snap("npm:one"));
        let live = registry.new_sink(snap("npm:one"));

        stale.report(json!({"message": "late crash from the old context"}));
        live.report(json!({"message": "current crash"}));

        // Only the live sink's report arrives.
        let notification = rx.recv().await.unwrap();
        assert_eq!(
            notification.params.unwrap()["error"]["message"],
            json!("current crash")
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sinks_of_distinct_snaps_are_independent() {
        let (notifier, mut rx) = Notifier::channel();
        let registry = SinkRegistry::new(notifier);
        let first = registry.new_sink(snap("npm:one"));
        let _second = registry.new_sink(snap("npm:two"));

        // Minting npm:two's sink must not silence npm:one.
        first.report(json!({"message": "boom"}));
        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.params.unwrap()["snapId"], json!("npm:one"));
    }

    #[test]
    fn notify_survives_a_dropped_receiver() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.outbound_request(&snap("npm:one"), "wallet_getState");
    }
}
