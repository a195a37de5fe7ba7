//! Reconciles the two independently-arriving event streams (attribution
//! success/failure, deferred deep-link resolution) into a single combined
//! tracking payload, emitted at most once per session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use spotlog_events::Bus;
use spotlog_runtime::{merge_missing, TrackingPayload};
use spotlog_topics::{
    TOPIC_ATTRIBUTION_FAILED, TOPIC_ATTRIBUTION_RECEIVED, TOPIC_DEEPLINK_RESOLVED,
    TOPIC_TRACKING_COMBINED,
};

#[derive(Default)]
struct Inner {
    attribution: Option<TrackingPayload>,
    deeplink: Option<TrackingPayload>,
    /// Session-scoped guard: once a combined payload went out, later input
    /// is ignored.
    sent: bool,
    debounce: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }

    fn emit(&mut self, bus: &Bus) {
        if self.sent {
            return;
        }
        self.cancel_debounce();
        let mut merged = self.attribution.clone().unwrap_or_default();
        if let Some(link) = &self.deeplink {
            merge_missing(&mut merged, link);
        }
        debug!(keys = merged.len(), "combined tracking payload emitted");
        bus.publish(TOPIC_TRACKING_COMBINED, &Value::Object(merged));
        self.sent = true;
    }
}

/// Merges attribution and deep-link data arriving in either order (or not
/// at all) within a bounded wait window.
#[derive(Clone)]
pub struct Combiner {
    inner: Arc<Mutex<Inner>>,
    bus: Bus,
    window: Duration,
}

impl Combiner {
    pub fn new(bus: Bus, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            bus,
            window,
        }
    }

    /// Attribution data arrived. Emits immediately when deep-link data is
    /// already present, otherwise arms the debounce window (re-arming
    /// cancels any previous timer).
    pub fn attribution_received(&self, payload: TrackingPayload) {
        let mut inner = self.inner.lock().expect("combiner lock");
        if inner.sent {
            return;
        }
        inner.attribution = Some(payload);
        if inner.deeplink.is_some() {
            inner.emit(&self.bus);
            return;
        }
        inner.cancel_debounce();
        let shared = self.inner.clone();
        let bus = self.bus.clone();
        let window = self.window;
        inner.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut inner = shared.lock().expect("combiner lock");
            inner.debounce = None;
            inner.emit(&bus);
        }));
    }

    /// Attribution failed: emit an empty combined payload immediately, no
    /// wait for a deep link.
    pub fn attribution_failed(&self) {
        let mut inner = self.inner.lock().expect("combiner lock");
        if inner.sent {
            return;
        }
        inner.attribution = Some(TrackingPayload::new());
        inner.deeplink = None;
        inner.emit(&self.bus);
    }

    /// Deferred deep link resolved. Cancels a pending debounce; emits
    /// immediately when attribution data is already present.
    pub fn deeplink_resolved(&self, payload: TrackingPayload) {
        let mut inner = self.inner.lock().expect("combiner lock");
        if inner.sent {
            return;
        }
        inner.deeplink = Some(payload);
        inner.cancel_debounce();
        if inner.attribution.is_some() {
            inner.emit(&self.bus);
        }
    }

    /// Bridge bus-published input events into the combiner, so hosts can
    /// publish SDK callbacks instead of holding a reference to it.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let combiner = self.clone();
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                let env = match rx.recv().await {
                    Ok(env) => env,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "combiner listener lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let payload = match env.payload {
                    Value::Object(map) => map,
                    _ => TrackingPayload::new(),
                };
                match env.kind.as_str() {
                    TOPIC_ATTRIBUTION_RECEIVED => combiner.attribution_received(payload),
                    TOPIC_ATTRIBUTION_FAILED => combiner.attribution_failed(),
                    TOPIC_DEEPLINK_RESOLVED => combiner.deeplink_resolved(payload),
                    _ => {}
                }
            }
        })
    }
}
