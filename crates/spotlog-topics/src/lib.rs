//! Canonical event topic constants shared across the pipeline crates.
//!
//! Centralizing the string constants keeps publishers and subscribers in
//! sync. Keep this list alphabetized within sections and favor dot.case
//! names.

// Attribution / deep links
pub const TOPIC_ATTRIBUTION_FAILED: &str = "attribution.data.failed";
pub const TOPIC_ATTRIBUTION_RECEIVED: &str = "attribution.data.received";
pub const TOPIC_DEEPLINK_RESOLVED: &str = "deeplink.resolved";

// Launch pipeline
pub const TOPIC_LINK_READY: &str = "launch.link.ready";
pub const TOPIC_PHASE_CHANGED: &str = "launch.phase.changed";
pub const TOPIC_TRACKING_COMBINED: &str = "launch.tracking.combined";

// Notification permissions
pub const TOPIC_PERMS_DECISION_RECORDED: &str = "perms.decision.recorded";
pub const TOPIC_PERMS_PROMPT_REQUESTED: &str = "perms.prompt.requested";

// Connectivity
pub const TOPIC_CONNECTIVITY_CHANGED: &str = "net.connectivity.changed";
