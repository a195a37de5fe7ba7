//! Startup pipeline: decides, once per session, whether the app shows the
//! native fishing journal or the remote attribution-tagged log view.
//!
//! The flow is event-driven end to end. SDK callbacks and host signals are
//! published on the [`spotlog_events::Bus`]; the [`Combiner`] reconciles
//! attribution and deep-link data into one tracking payload; the
//! [`SplashOrchestrator`] runs the phase decision over it, talking to the
//! attribution and remote-config endpoints and to the [`PermissionGate`],
//! and exposes the committed [`spotlog_runtime::PhaseSnapshot`] through a
//! watch channel.

pub mod attribution;
pub mod combiner;
pub mod config;
pub mod config_fetch;
pub mod deeplink;
mod http;
pub mod orchestrator;
pub mod permissions;

pub use attribution::{AttributionClient, AttributionFetch};
pub use combiner::Combiner;
pub use config::{LaunchConfig, LaunchTimers};
pub use config_fetch::{ConfigClient, ConfigFetch};
pub use deeplink::DeepLinkListener;
pub use orchestrator::{OrchestratorHandle, SplashOrchestrator};
pub use permissions::{PermissionGate, PROMPT_COOLDOWN_SECS};
