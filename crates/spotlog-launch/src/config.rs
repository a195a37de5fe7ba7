use std::time::Duration;

use chrono::NaiveDate;

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Identifiers and endpoints the pipeline needs. Hosts either fill the
/// fields directly or load them from `SPOTLOG_*` environment variables.
#[derive(Clone, Debug)]
pub struct LaunchConfig {
    /// Base URL of the attribution service.
    pub attribution_base: String,
    /// Application identifier at the attribution service.
    pub app_id: String,
    /// Developer key for the attribution service.
    pub dev_key: String,
    /// Remote configuration endpoint (receives the merged tracking payload).
    pub config_endpoint: String,
    pub bundle_id: String,
    pub analytics_id: String,
    pub store_id: String,
    pub locale: String,
    pub platform: String,
    /// Before this date every assessment falls back to the native journal
    /// (staged-rollout guard). Kept as configuration rather than a literal.
    pub cutover_date: NaiveDate,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            attribution_base: "https://attr.spotlog.app/v1".to_string(),
            app_id: String::new(),
            dev_key: String::new(),
            config_endpoint: String::new(),
            bundle_id: "com.spotlog.app".to_string(),
            analytics_id: String::new(),
            store_id: String::new(),
            locale: "en".to_string(),
            platform: "ios".to_string(),
            cutover_date: default_cutover(),
        }
    }
}

fn default_cutover() -> NaiveDate {
    // The staged-rollout date the shipped app used.
    NaiveDate::from_ymd_opt(2025, 12, 29).expect("valid default cutover date")
}

impl LaunchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cutover_date = std::env::var("SPOTLOG_CUTOVER_DATE")
            .ok()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .unwrap_or(defaults.cutover_date);
        Self {
            attribution_base: env_str("SPOTLOG_ATTRIBUTION_BASE", &defaults.attribution_base),
            app_id: env_str("SPOTLOG_APP_ID", ""),
            dev_key: env_str("SPOTLOG_DEV_KEY", ""),
            config_endpoint: env_str("SPOTLOG_CONFIG_URL", ""),
            bundle_id: env_str("SPOTLOG_BUNDLE_ID", &defaults.bundle_id),
            analytics_id: env_str("SPOTLOG_ANALYTICS_ID", ""),
            store_id: env_str("SPOTLOG_STORE_ID", ""),
            locale: env_str("SPOTLOG_LOCALE", &defaults.locale),
            platform: env_str("SPOTLOG_PLATFORM", &defaults.platform),
            cutover_date,
        }
    }

    pub fn cutover_reached(&self, today: NaiveDate) -> bool {
        today >= self.cutover_date
    }
}

/// Timer windows for the launch sequence. Defaults are the shipped
/// production values; tests shrink them or run under a paused clock.
#[derive(Clone, Debug)]
pub struct LaunchTimers {
    /// Debounce after attribution success waiting for a deep link.
    pub combine_window: Duration,
    /// Absolute deadline after which a silent setup degrades to legacy.
    pub launch_deadline: Duration,
    /// Hold before the first-run attribution fetch.
    pub first_run_hold: Duration,
    /// Delay before the cutover gate forces legacy.
    pub cutover_delay: Duration,
}

impl Default for LaunchTimers {
    fn default() -> Self {
        Self {
            combine_window: Duration::from_secs(10),
            launch_deadline: Duration::from_secs(30),
            first_run_hold: Duration::from_secs(5),
            cutover_delay: Duration::from_secs(1),
        }
    }
}
