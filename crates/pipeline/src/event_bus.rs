//! C12: Event Bus & Sequencer.
//!
//! Single-writer monotonic sequence counter per session. Every component
//! publishes through `EventBus::publish`; subscribers get a `broadcast`
//! receiver with a bounded backlog (1024) and drop-oldest semantics — a
//! lagging subscriber sees `stats{dropped}` logged and simply resumes from
//! the next event rather than blocking the writer.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use uuid::Uuid;
use voice_agent_core::{EventKind, UnifiedEvent};

const SUBSCRIBER_CAPACITY: usize = 1024;

pub struct EventBus {
    tx: broadcast::Sender<UnifiedEvent>,
    seq: AtomicU64,
    corr: Uuid,
}

impl EventBus {
    pub fn new(corr: Uuid) -> Self {
        let (tx, _rx) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            tx,
            seq: AtomicU64::new(0),
            corr,
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.corr
    }

    /// Assign the next sequence number and publish. Returns the stamped
    /// event so the caller can also persist it (e.g. into history) without
    /// racing a subscriber for the assigned `seq`.
    pub fn publish(&self, kind: EventKind, payload: serde_json::Value) -> UnifiedEvent {
        let mut event = UnifiedEvent::new(self.corr, kind, payload);
        event.seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        // No active subscribers is not an error; the event was still assigned
        // a seq and can be replayed from history.
        let _ = self.tx.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct EventSubscriber {
    rx: broadcast::Receiver<UnifiedEvent>,
}

impl EventSubscriber {
    /// Await the next event, transparently skipping past a lag gap. Returns
    /// `None` once the bus itself has been dropped.
    pub async fn recv(&mut self) -> Option<UnifiedEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    tracing::warn!(dropped, "event bus subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seq_strictly_increases() {
        let bus = EventBus::new(Uuid::new_v4());
        let mut sub = bus.subscribe();
        bus.publish(EventKind::Partial, serde_json::json!({}));
        bus.publish(EventKind::Final, serde_json::json!({}));

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(second.seq > first.seq);
    }

    #[tokio::test]
    async fn every_event_carries_the_session_correlation_id() {
        let corr = Uuid::new_v4();
        let bus = EventBus::new(corr);
        let mut sub = bus.subscribe();
        bus.publish(EventKind::Status, serde_json::json!({"state": "listening"}));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.corr, corr);
    }
}
