//! Deferred deep-link and push-notification link handling.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use spotlog_events::Bus;
use spotlog_runtime::TrackingPayload;
use spotlog_store::Store;
use spotlog_topics::{TOPIC_DEEPLINK_RESOLVED, TOPIC_LINK_READY};

/// Extract a link from a generic notification payload: a top-level `url`
/// field, or a nested `data.url` field.
pub fn extract_link(payload: &Value) -> Option<&str> {
    if let Some(link) = payload.get("url").and_then(|v| v.as_str()) {
        return Some(link);
    }
    payload
        .get("data")
        .and_then(|d| d.get("url"))
        .and_then(|v| v.as_str())
}

/// Receives deferred deep-link resolutions and push payloads from the host
/// shell and publishes them as events. Push URLs are parked in the store
/// (`temp_url`) and announced after a short delay, giving the pipeline time
/// to come up.
#[derive(Clone)]
pub struct DeepLinkListener {
    bus: Bus,
    store: Store,
    park_delay: Duration,
}

impl DeepLinkListener {
    pub fn new(bus: Bus, store: Store) -> Self {
        Self {
            bus,
            store,
            park_delay: Duration::from_secs(2),
        }
    }

    pub fn with_park_delay(mut self, delay: Duration) -> Self {
        self.park_delay = delay;
        self
    }

    /// A deferred deep link resolved for this session.
    pub fn resolved(&self, payload: TrackingPayload) {
        debug!(keys = payload.len(), "deep link resolved");
        self.bus
            .publish(TOPIC_DEEPLINK_RESOLVED, &Value::Object(payload));
    }

    /// A push notification payload arrived; park any carried URL.
    pub fn notification_received(&self, payload: &Value) {
        let Some(link) = extract_link(payload) else {
            return;
        };
        if let Err(err) = self.store.set_temp_url(link) {
            warn!(%err, "failed to park push link");
            return;
        }
        let bus = self.bus.clone();
        let link = link.to_string();
        let delay = self.park_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.publish(TOPIC_LINK_READY, &json!({ "temp_url": link }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn extract_link_prefers_top_level_url() {
        let payload = json!({"url": "https://a/x", "data": {"url": "https://a/nested"}});
        assert_eq!(extract_link(&payload), Some("https://a/x"));
    }

    #[test]
    fn extract_link_reads_nested_data_url() {
        let payload = json!({"data": {"url": "https://a/nested"}});
        assert_eq!(extract_link(&payload), Some("https://a/nested"));
        assert_eq!(extract_link(&json!({"data": {}})), None);
        assert_eq!(extract_link(&json!({"aps": {"alert": "hi"}})), None);
    }

    #[tokio::test(start_paused = true)]
    async fn notification_parks_url_and_announces_after_delay() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let listener = DeepLinkListener::new(bus, store.clone());

        listener.notification_received(&json!({"url": "https://a/promo"}));
        assert_eq!(store.temp_url().unwrap().as_deref(), Some("https://a/promo"));

        tokio::time::advance(Duration::from_secs(2)).await;
        let env = rx.recv().await.expect("link ready event");
        assert_eq!(env.kind, TOPIC_LINK_READY);
        assert_eq!(env.payload["temp_url"], "https://a/promo");
    }

    #[tokio::test]
    async fn notifications_without_links_are_ignored() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let bus = Bus::new(8);
        let listener = DeepLinkListener::new(bus, store.clone());

        listener.notification_received(&json!({"aps": {"alert": "bite alarm"}}));
        assert_eq!(store.temp_url().unwrap(), None);
    }
}
