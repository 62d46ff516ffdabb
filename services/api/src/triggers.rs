//! services/api/src/triggers.rs
//!
//! Delivers committed-write events to the counter engine in the background.
//!
//! Handlers write back through the store after the client's write has already
//! been acknowledged, so a failed delivery is logged and never surfaces to the
//! client.

use std::sync::Arc;

use threadboard_core::{CounterEngine, TriggerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The sending half of the trigger queue, shared by every request handler.
#[derive(Clone)]
pub struct TriggerPublisher {
    tx: mpsc::UnboundedSender<TriggerEvent>,
}

impl TriggerPublisher {
    pub fn publish(&self, event: TriggerEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(path = %e.0.path, "Trigger loop has stopped; event dropped");
        }
    }
}

/// Starts the background loop that feeds events to `engine`.
///
/// Each event runs on its own task, so handlers for unrelated documents proceed
/// concurrently. The loop exits when `shutdown` is cancelled or every publisher
/// has been dropped.
pub fn spawn_trigger_loop(
    engine: Arc<CounterEngine>,
    shutdown: CancellationToken,
) -> (TriggerPublisher, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<TriggerEvent>();

    let handle = tokio::spawn(async move {
        info!("Trigger loop started.");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Trigger loop cancelled.");
                    break;
                }
                next = rx.recv() => match next {
                    Some(event) => {
                        tokio::spawn(deliver(engine.clone(), event));
                    }
                    None => {
                        info!("All trigger publishers dropped; loop exiting.");
                        break;
                    }
                },
            }
        }
    });

    (TriggerPublisher { tx }, handle)
}

async fn deliver(engine: Arc<CounterEngine>, event: TriggerEvent) {
    match engine.dispatch(&event).await {
        Ok(outcome) => debug!(path = %event.path, kind = ?event.kind, ?outcome, "Trigger handled"),
        Err(e) => warn!(path = %event.path, kind = ?event.kind, "Trigger handler failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};
    use threadboard_core::{DocPath, DocumentStore, Fields, InMemoryDocumentStore};

    use super::*;

    fn path(raw: &str) -> DocPath {
        DocPath::parse(raw).unwrap()
    }

    fn body(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn wait_for_subscribers(store: &InMemoryDocumentStore, expected: i64) -> bool {
        for _ in 0..100 {
            let category = store.get(&path("categories/yoga")).await.unwrap().unwrap();
            if category["numOfSubscribers"].as_i64() == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn published_events_reach_the_engine() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .set(&path("categories/yoga"), body(json!({"ownerId": "U1", "numOfSubscribers": 0})))
            .await
            .unwrap();
        let engine = Arc::new(CounterEngine::new(store.clone()));
        let shutdown = CancellationToken::new();
        let (publisher, handle) = spawn_trigger_loop(engine, shutdown.clone());

        for uid in ["U2", "U3"] {
            publisher.publish(TriggerEvent::created(
                path(&format!("categories/yoga/subscriberIds/{}", uid)),
                body(json!({"uid": uid, "categoryId": "yoga"})),
            ));
        }

        assert!(wait_for_subscribers(&store, 2).await);
        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn loop_exits_when_publishers_are_dropped() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let engine = Arc::new(CounterEngine::new(store));
        let (publisher, handle) = spawn_trigger_loop(engine, CancellationToken::new());
        drop(publisher);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
