//! Sends the merged tracking payload plus device attributes to the remote
//! configuration endpoint and receives back the content URL to display.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use spotlog_runtime::{LaunchError, TrackingPayload};
use spotlog_store::Store;

use crate::config::LaunchConfig;
use crate::http;

#[async_trait]
pub trait ConfigFetch: Send + Sync {
    /// One POST, no retries; the caller falls back to the cached URL.
    async fn fetch_config(&self, tracking: &TrackingPayload) -> Result<Url, LaunchError>;
}

pub struct ConfigClient {
    cfg: Arc<LaunchConfig>,
    store: Store,
    http: reqwest::Client,
}

impl ConfigClient {
    pub fn new(cfg: Arc<LaunchConfig>, store: Store) -> Self {
        Self {
            cfg,
            store,
            http: http::client().clone(),
        }
    }

    fn endpoint(&self) -> Result<Url, LaunchError> {
        let raw = self.cfg.config_endpoint.trim();
        if raw.is_empty() {
            return Err(LaunchError::Configuration("config endpoint is empty".into()));
        }
        Url::parse(raw).map_err(|err| LaunchError::Configuration(format!("config endpoint: {err}")))
    }

    fn request_body(&self, tracking: &TrackingPayload) -> TrackingPayload {
        let mut body = tracking.clone();
        body.insert("platform".into(), Value::from(self.cfg.platform.clone()));
        if let Ok(tracking_id) = self.store.tracking_id() {
            body.insert("tracking_id".into(), Value::from(tracking_id));
        }
        body.insert("bundle_id".into(), Value::from(self.cfg.bundle_id.clone()));
        body.insert(
            "analytics_id".into(),
            Value::from(self.cfg.analytics_id.clone()),
        );
        body.insert("store_id".into(), Value::from(self.cfg.store_id.clone()));
        // Best-effort; the push token may not have been issued yet.
        if let Ok(Some(token)) = self.store.push_token() {
            body.insert("push_token".into(), Value::from(token));
        }
        body.insert("locale".into(), Value::from(self.cfg.locale.clone()));
        body
    }
}

/// Response must be `{ ok: true, url: <well-formed URL> }`.
pub(crate) fn parse_config_response(value: &Value) -> Result<Url, LaunchError> {
    let ok = value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if !ok {
        return Err(LaunchError::Decode("config response not ok".into()));
    }
    let raw = value
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LaunchError::Decode("config response missing url".into()))?;
    Url::parse(raw).map_err(|err| LaunchError::Decode(format!("config url: {err}")))
}

#[async_trait]
impl ConfigFetch for ConfigClient {
    async fn fetch_config(&self, tracking: &TrackingPayload) -> Result<Url, LaunchError> {
        let endpoint = self.endpoint()?;
        let body = self.request_body(tracking);

        let resp = self
            .http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| LaunchError::Network(err.to_string()))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(LaunchError::Network(format!(
                "config endpoint returned {}",
                resp.status()
            )));
        }
        let value: Value = resp
            .json()
            .await
            .map_err(|err| LaunchError::Decode(err.to_string()))?;
        let url = parse_config_response(&value)?;
        debug!(%url, "remote config resolved");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn client_with(cfg: LaunchConfig) -> (ConfigClient, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (ConfigClient::new(Arc::new(cfg), store), dir)
    }

    #[tokio::test]
    async fn missing_endpoint_is_a_configuration_error() {
        let (client, _dir) = client_with(LaunchConfig::default());
        let err = client
            .fetch_config(&TrackingPayload::new())
            .await
            .expect_err("empty endpoint must fail");
        assert!(matches!(err, LaunchError::Configuration(_)));
    }

    #[test]
    fn request_body_carries_device_attributes() {
        let cfg = LaunchConfig {
            config_endpoint: "https://cfg.example/launch".into(),
            bundle_id: "com.spotlog.app".into(),
            analytics_id: "spotlog-prod".into(),
            store_id: "987".into(),
            locale: "de".into(),
            ..LaunchConfig::default()
        };
        let (client, _dir) = client_with(cfg);
        client.store.set_push_token("tok-1").unwrap();

        let mut tracking = TrackingPayload::new();
        tracking.insert("af_status".into(), json!("Organic"));
        let body = client.request_body(&tracking);

        assert_eq!(body.get("af_status"), Some(&json!("Organic")));
        assert_eq!(body.get("platform"), Some(&json!("ios")));
        assert_eq!(body.get("bundle_id"), Some(&json!("com.spotlog.app")));
        assert_eq!(body.get("analytics_id"), Some(&json!("spotlog-prod")));
        assert_eq!(body.get("store_id"), Some(&json!("987")));
        assert_eq!(body.get("push_token"), Some(&json!("tok-1")));
        assert_eq!(body.get("locale"), Some(&json!("de")));
        assert!(body.get("tracking_id").is_some());
    }

    #[test]
    fn push_token_is_omitted_when_absent() {
        let (client, _dir) = client_with(LaunchConfig::default());
        let body = client.request_body(&TrackingPayload::new());
        assert!(body.get("push_token").is_none());
    }

    #[test]
    fn response_parsing_rejects_bad_shapes() {
        let ok = json!({"ok": true, "url": "https://x/y"});
        assert_eq!(
            parse_config_response(&ok).unwrap(),
            Url::parse("https://x/y").unwrap()
        );
        for bad in [
            json!({"ok": false, "url": "https://x/y"}),
            json!({"url": "https://x/y"}),
            json!({"ok": true}),
            json!({"ok": true, "url": "not a url"}),
        ] {
            assert!(matches!(
                parse_config_response(&bad),
                Err(LaunchError::Decode(_))
            ));
        }
    }
}
