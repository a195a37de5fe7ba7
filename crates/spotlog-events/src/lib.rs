//! In-process event bus for the launch pipeline.
//!
//! Every component publishes and subscribes through a shared [`Bus`];
//! there is no ambient global delegate. A bus is created once per app
//! session and stamps each envelope with that session's id, so consumers
//! can tell replayed or cross-session payloads apart when events are
//! logged or persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod test_support;

/// One pipeline event: topic kind plus a JSON payload, stamped with the
/// publish time and the originating session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub time: DateTime<Utc>,
    pub session: Uuid,
    pub kind: String,
    pub payload: Value,
}

#[derive(Clone)]
pub struct Bus {
    session: Uuid,
    tx: broadcast::Sender<Envelope>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            session: Uuid::new_v4(),
            tx,
        }
    }

    /// Id of the session this bus serves; identical on every envelope it
    /// emits.
    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Publish a payload under a topic kind. Payloads that fail to
    /// serialize go out as JSON null rather than being dropped, so
    /// subscribers still observe the event itself.
    pub fn publish<T: Serialize>(&self, kind: &str, payload: &T) {
        let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        let _ = self.tx.send(Envelope {
            time: Utc::now(),
            session: self.session,
            kind: kind.to_string(),
            payload,
        });
    }
}
