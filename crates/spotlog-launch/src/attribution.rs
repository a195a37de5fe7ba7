//! Fetches install/conversion attribution data and normalizes it into a
//! generic tracking payload.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use spotlog_runtime::{merge_missing, LaunchError, TrackingPayload};
use spotlog_store::Store;

use crate::config::LaunchConfig;
use crate::http;

/// Seam for the orchestrator: the HTTP implementation lives behind this so
/// the pipeline can be driven without a network.
#[async_trait]
pub trait AttributionFetch: Send + Sync {
    /// Fetch attribution data and merge `link_data` into it. Response
    /// values take priority; deep-link values only fill gaps. No retries.
    async fn fetch_organic(
        &self,
        link_data: &TrackingPayload,
    ) -> Result<TrackingPayload, LaunchError>;
}

pub struct AttributionClient {
    cfg: Arc<LaunchConfig>,
    store: Store,
    http: reqwest::Client,
}

impl AttributionClient {
    pub fn new(cfg: Arc<LaunchConfig>, store: Store) -> Self {
        Self {
            cfg,
            store,
            http: http::client().clone(),
        }
    }

    fn endpoint(&self, tracking_id: &str) -> Result<Url, LaunchError> {
        let cfg = &self.cfg;
        if cfg.app_id.trim().is_empty() {
            return Err(LaunchError::Configuration("app id is empty".into()));
        }
        if cfg.dev_key.trim().is_empty() {
            return Err(LaunchError::Configuration("dev key is empty".into()));
        }
        if tracking_id.trim().is_empty() {
            return Err(LaunchError::Configuration("tracking id is empty".into()));
        }
        let raw = format!(
            "{}/id{}",
            cfg.attribution_base.trim_end_matches('/'),
            cfg.app_id
        );
        let mut url = Url::parse(&raw)
            .map_err(|err| LaunchError::Configuration(format!("attribution endpoint: {err}")))?;
        url.query_pairs_mut()
            .append_pair("devkey", &cfg.dev_key)
            .append_pair("device_id", tracking_id);
        Ok(url)
    }
}

pub(crate) fn payload_object(value: Value) -> Result<TrackingPayload, LaunchError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(LaunchError::Decode(format!(
            "expected JSON object, got {other}"
        ))),
    }
}

#[async_trait]
impl AttributionFetch for AttributionClient {
    async fn fetch_organic(
        &self,
        link_data: &TrackingPayload,
    ) -> Result<TrackingPayload, LaunchError> {
        let tracking_id = self
            .store
            .tracking_id()
            .map_err(|err| LaunchError::Configuration(format!("tracking id: {err}")))?;
        let url = self.endpoint(&tracking_id)?;

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| LaunchError::Network(err.to_string()))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(LaunchError::Network(format!(
                "attribution endpoint returned {}",
                resp.status()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|err| LaunchError::Decode(err.to_string()))?;
        let mut merged = payload_object(body)?;
        merge_missing(&mut merged, link_data);
        debug!(keys = merged.len(), "attribution payload received");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn client_with(cfg: LaunchConfig) -> (AttributionClient, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (AttributionClient::new(Arc::new(cfg), store), dir)
    }

    #[tokio::test]
    async fn empty_identifiers_fail_before_any_request() {
        let (client, _dir) = client_with(LaunchConfig::default());
        let err = client
            .fetch_organic(&TrackingPayload::new())
            .await
            .expect_err("missing app id must fail");
        assert!(matches!(err, LaunchError::Configuration(_)));
    }

    #[test]
    fn endpoint_encodes_identifiers() {
        let cfg = LaunchConfig {
            attribution_base: "https://attr.example/v1/".into(),
            app_id: "6756785970".into(),
            dev_key: "devkey-abc".into(),
            ..LaunchConfig::default()
        };
        let (client, _dir) = client_with(cfg);
        let url = client.endpoint("device-123").unwrap();
        assert_eq!(url.path(), "/v1/id6756785970");
        assert_eq!(
            url.query().unwrap(),
            "devkey=devkey-abc&device_id=device-123"
        );
    }

    #[test]
    fn non_object_bodies_are_decode_errors() {
        assert!(payload_object(json!({"af_status": "Organic"})).is_ok());
        assert!(matches!(
            payload_object(json!(["not", "an", "object"])),
            Err(LaunchError::Decode(_))
        ));
    }
}
