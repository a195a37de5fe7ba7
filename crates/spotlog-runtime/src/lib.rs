use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Key-value tracking data as returned by the attribution service or
/// carried by a deferred deep link.
pub type TrackingPayload = serde_json::Map<String, Value>;

/// App-state label meaning the install has permanently fallen back to the
/// native journal.
pub const APP_STATE_INACTIVE: &str = "Inactive";
/// App-state label meaning a remote content URL is the active surface.
pub const APP_STATE_LOG_VIEW: &str = "LogView";

/// Attribution payload key carrying the organic/non-organic status flag.
/// The key name follows the attribution provider's wire format.
pub const STATUS_KEY: &str = "af_status";
pub const STATUS_ORGANIC: &str = "Organic";

/// Top-level operating mode of the application for the current session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Setup,
    Operational,
    Legacy,
    Disconnected,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Operational => "operational",
            Phase::Legacy => "legacy",
            Phase::Disconnected => "disconnected",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Phase::Setup => "Setup",
            Phase::Operational => "Operational",
            Phase::Legacy => "Legacy",
            Phase::Disconnected => "Disconnected",
        }
    }

    pub fn from_slug(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "operational" | "online" => Phase::Operational,
            "legacy" | "native" => Phase::Legacy,
            "disconnected" | "offline" => Phase::Disconnected,
            _ => Phase::Setup,
        }
    }
}

/// What the presentation layer observes: the committed phase, the remote
/// content URL when one is staged, and whether the permission prompt is
/// currently interposed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PhaseSnapshot {
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_url: Option<Url>,
    #[serde(default)]
    pub prompt_visible: bool,
    pub updated_at: DateTime<Utc>,
}

impl PhaseSnapshot {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            log_url: None,
            prompt_visible: false,
            updated_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.log_url = Some(url);
        self
    }
}

impl Default for PhaseSnapshot {
    fn default() -> Self {
        Self::new(Phase::Setup)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// First-writer-wins merge: keys already present in `into` are kept,
/// `from` only fills gaps.
pub fn merge_missing(into: &mut TrackingPayload, from: &TrackingPayload) {
    for (k, v) in from.iter() {
        if !into.contains_key(k) {
            into.insert(k.clone(), v.clone());
        }
    }
}

fn is_organic(tracking: &TrackingPayload) -> bool {
    tracking
        .get(STATUS_KEY)
        .and_then(|v| v.as_str())
        .map(|s| s == STATUS_ORGANIC)
        .unwrap_or(false)
}

/// Classify the session phase from the combined tracking payload and the
/// persisted install history. Pure and deterministic; first match wins.
///
/// The ordering encodes: empty tracking always degrades to the native
/// fallback; a deactivated install never re-engages; first-run organic
/// installs go through full setup rather than a stale interim URL; a fresh
/// deep-link URL with no active content jumps straight to operational.
pub fn resolve_phase(
    tracking: &TrackingPayload,
    is_initial_run: bool,
    active_url: Option<&Url>,
    interim_url: Option<&str>,
    app_state: Option<&str>,
) -> Phase {
    if tracking.is_empty() {
        return Phase::Legacy;
    }
    if app_state == Some(APP_STATE_INACTIVE) {
        return Phase::Legacy;
    }
    if is_initial_run && is_organic(tracking) {
        return Phase::Setup;
    }
    if let Some(interim) = interim_url {
        if Url::parse(interim).is_ok() && active_url.is_none() {
            return Phase::Operational;
        }
    }
    Phase::Setup
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(entries: &[(&str, &str)]) -> TrackingPayload {
        let mut map = TrackingPayload::new();
        for (k, v) in entries {
            map.insert(k.to_string(), json!(v));
        }
        map
    }

    #[test]
    fn empty_tracking_always_resolves_legacy() {
        let empty = TrackingPayload::new();
        for initial in [true, false] {
            assert_eq!(
                resolve_phase(&empty, initial, None, Some("https://a.example/x"), None),
                Phase::Legacy
            );
        }
    }

    #[test]
    fn inactive_app_state_resolves_legacy_regardless_of_tracking() {
        let tracking = payload(&[(STATUS_KEY, STATUS_ORGANIC), ("campaign", "spring")]);
        assert_eq!(
            resolve_phase(
                &tracking,
                true,
                None,
                Some("https://a.example/x"),
                Some(APP_STATE_INACTIVE)
            ),
            Phase::Legacy
        );
    }

    #[test]
    fn first_run_organic_goes_through_setup() {
        let tracking = payload(&[(STATUS_KEY, STATUS_ORGANIC)]);
        // Even with a parked interim URL the first organic run never
        // short-circuits to operational.
        assert_eq!(
            resolve_phase(&tracking, true, None, Some("https://a.example/x"), None),
            Phase::Setup
        );
    }

    #[test]
    fn interim_url_with_no_active_url_is_operational() {
        let tracking = payload(&[(STATUS_KEY, "Non-organic")]);
        assert_eq!(
            resolve_phase(&tracking, false, None, Some("https://a.example/x"), None),
            Phase::Operational
        );
    }

    #[test]
    fn malformed_interim_url_falls_through_to_setup() {
        let tracking = payload(&[(STATUS_KEY, "Non-organic")]);
        assert_eq!(
            resolve_phase(&tracking, false, None, Some("not a url"), None),
            Phase::Setup
        );
    }

    #[test]
    fn interim_url_is_ignored_when_a_url_is_already_active() {
        let tracking = payload(&[(STATUS_KEY, "Non-organic")]);
        let active = Url::parse("https://a.example/current").unwrap();
        assert_eq!(
            resolve_phase(
                &tracking,
                false,
                Some(&active),
                Some("https://a.example/x"),
                None
            ),
            Phase::Setup
        );
    }

    #[test]
    fn merge_missing_keeps_existing_keys() {
        let mut acc = payload(&[("media_source", "organic"), ("campaign", "none")]);
        let incoming = payload(&[("campaign", "paid"), ("deep_link_value", "promo")]);
        merge_missing(&mut acc, &incoming);
        assert_eq!(acc.get("campaign"), Some(&json!("none")));
        assert_eq!(acc.get("deep_link_value"), Some(&json!("promo")));
    }

    #[test]
    fn phase_labels_match_snake_case() {
        assert_eq!(Phase::Setup.as_str(), "setup");
        assert_eq!(Phase::Operational.as_str(), "operational");
        assert_eq!(Phase::Legacy.as_str(), "legacy");
        assert_eq!(Phase::Disconnected.as_str(), "disconnected");
        assert_eq!(Phase::Legacy.display_label(), "Legacy");
    }

    #[test]
    fn phase_from_slug_handles_synonyms() {
        assert_eq!(Phase::from_slug("OFFLINE"), Phase::Disconnected);
        assert_eq!(Phase::from_slug(" native "), Phase::Legacy);
        assert_eq!(Phase::from_slug("online"), Phase::Operational);
        assert_eq!(Phase::from_slug("anything-else"), Phase::Setup);
    }
}
