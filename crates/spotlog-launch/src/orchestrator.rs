//! Top-level launch coordinator: sequences attribution, deep links,
//! remote configuration, permissions, and connectivity into the final
//! phase the presentation layer renders.
//!
//! All pipeline state lives on one sequencing task; network calls, timers,
//! and the permission dialog are suspension points on it. Inputs arrive as
//! bus events, connectivity watch updates, and permission commands; the
//! committed phase is exposed through a watch channel.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use spotlog_events::{Bus, Envelope};
use spotlog_runtime::{
    resolve_phase, Phase, PhaseSnapshot, TrackingPayload, APP_STATE_INACTIVE, APP_STATE_LOG_VIEW,
};
use spotlog_store::Store;
use spotlog_topics::{
    TOPIC_CONNECTIVITY_CHANGED, TOPIC_DEEPLINK_RESOLVED, TOPIC_LINK_READY,
    TOPIC_PERMS_DECISION_RECORDED, TOPIC_PERMS_PROMPT_REQUESTED, TOPIC_PHASE_CHANGED,
    TOPIC_TRACKING_COMBINED,
};

use crate::attribution::AttributionFetch;
use crate::config::{LaunchConfig, LaunchTimers};
use crate::config_fetch::ConfigFetch;
use crate::permissions::PermissionGate;

#[derive(Debug)]
enum Command {
    Decision { accepted: bool },
    Skipped,
}

/// Handle the host keeps: observe the phase, answer permission prompts.
pub struct OrchestratorHandle {
    snapshot_rx: watch::Receiver<PhaseSnapshot>,
    cmd_tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl OrchestratorHandle {
    pub fn snapshot(&self) -> PhaseSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PhaseSnapshot> {
        self.snapshot_rx.clone()
    }

    /// The user answered the permission prompt.
    pub async fn permission_decision(&self, accepted: bool) {
        let _ = self.cmd_tx.send(Command::Decision { accepted }).await;
    }

    /// The user dismissed the prompt without deciding.
    pub async fn permission_skipped(&self) {
        let _ = self.cmd_tx.send(Command::Skipped).await;
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

pub struct SplashOrchestrator {
    store: Store,
    bus: Bus,
    attribution: Arc<dyn AttributionFetch>,
    config: Arc<dyn ConfigFetch>,
    connectivity: watch::Receiver<bool>,
    cfg: Arc<LaunchConfig>,
    timers: LaunchTimers,
}

impl SplashOrchestrator {
    pub fn new(
        store: Store,
        bus: Bus,
        attribution: Arc<dyn AttributionFetch>,
        config: Arc<dyn ConfigFetch>,
        connectivity: watch::Receiver<bool>,
        cfg: Arc<LaunchConfig>,
    ) -> Self {
        Self {
            store,
            bus,
            attribution,
            config,
            connectivity,
            cfg,
            timers: LaunchTimers::default(),
        }
    }

    pub fn with_timers(mut self, timers: LaunchTimers) -> Self {
        self.timers = timers;
        self
    }

    pub fn spawn(self) -> OrchestratorHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(PhaseSnapshot::default());
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        // Subscribe before the task starts so no launch event is missed.
        let bus_rx = self.bus.subscribe();
        let gate = PermissionGate::new(self.store.clone());
        let driver = Driver {
            store: self.store,
            bus: self.bus,
            attribution: self.attribution,
            config: self.config,
            gate,
            cfg: self.cfg,
            timers: self.timers,
            snapshot: snapshot_tx,
            phase: Phase::Setup,
            log_url: None,
            prompt_visible: false,
            tracking: TrackingPayload::new(),
            tracking_seen: false,
            link_data: TrackingPayload::new(),
        };
        let task = tokio::spawn(driver.run(bus_rx, cmd_rx, self.connectivity));
        OrchestratorHandle {
            snapshot_rx,
            cmd_tx,
            task,
        }
    }
}

struct Driver {
    store: Store,
    bus: Bus,
    attribution: Arc<dyn AttributionFetch>,
    config: Arc<dyn ConfigFetch>,
    gate: PermissionGate,
    cfg: Arc<LaunchConfig>,
    timers: LaunchTimers,
    snapshot: watch::Sender<PhaseSnapshot>,
    phase: Phase,
    log_url: Option<Url>,
    prompt_visible: bool,
    tracking: TrackingPayload,
    tracking_seen: bool,
    link_data: TrackingPayload,
}

fn as_object(value: Value) -> TrackingPayload {
    match value {
        Value::Object(map) => map,
        _ => TrackingPayload::new(),
    }
}

impl Driver {
    async fn run(
        mut self,
        mut bus_rx: broadcast::Receiver<Envelope>,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut conn_rx: watch::Receiver<bool>,
    ) {
        let deadline = tokio::time::sleep(self.timers.launch_deadline);
        tokio::pin!(deadline);
        let mut deadline_armed = true;
        let mut conn_open = true;
        loop {
            tokio::select! {
                _ = &mut deadline, if deadline_armed => {
                    deadline_armed = false;
                    if !self.tracking_seen && self.phase == Phase::Setup {
                        info!("launch deadline elapsed without tracking data");
                        self.commit(Phase::Legacy);
                    }
                }
                event = bus_rx.recv() => match event {
                    Ok(env) => self.on_event(env).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "orchestrator lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = conn_rx.changed(), if conn_open => match changed {
                    Ok(()) => {
                        let online = *conn_rx.borrow();
                        self.on_connectivity(online).await;
                    }
                    Err(_) => conn_open = false,
                },
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => break,
                },
            }
        }
    }

    async fn on_event(&mut self, env: Envelope) {
        match env.kind.as_str() {
            TOPIC_TRACKING_COMBINED => {
                self.tracking = as_object(env.payload);
                self.tracking_seen = true;
                self.assess().await;
            }
            TOPIC_DEEPLINK_RESOLVED => {
                self.link_data = as_object(env.payload);
            }
            TOPIC_LINK_READY => {
                // A push link was parked mid-session; reconsider once
                // tracking data is in.
                if self.tracking_seen {
                    self.assess().await;
                }
            }
            _ => {}
        }
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Skipped => {
                if let Err(err) = self.gate.record_skipped() {
                    warn!(%err, "failed to record prompt skip");
                }
                self.prompt_visible = false;
                if self.log_url.is_some() {
                    self.commit(Phase::Operational);
                } else {
                    self.config_setup().await;
                }
            }
            Command::Decision { accepted } => {
                if let Err(err) = self.gate.record_decision(accepted) {
                    warn!(%err, "failed to record permission decision");
                }
                self.bus
                    .publish(TOPIC_PERMS_DECISION_RECORDED, &json!({ "accepted": accepted }));
                self.prompt_visible = false;
                if self.log_url.is_some() {
                    self.commit(Phase::Operational);
                } else {
                    self.config_setup().await;
                }
            }
        }
    }

    async fn on_connectivity(&mut self, online: bool) {
        self.bus
            .publish(TOPIC_CONNECTIVITY_CHANGED, &json!({ "online": online }));
        if online {
            if self.phase == Phase::Disconnected {
                if self.log_url.is_none() {
                    self.log_url = self.stored_log_url();
                }
                match self.log_url {
                    Some(_) => self.commit(Phase::Operational),
                    None => self.deactivate(),
                }
            }
        } else if self.app_state().as_deref() == Some(APP_STATE_LOG_VIEW) {
            self.commit(Phase::Disconnected);
        } else {
            self.deactivate();
        }
    }

    /// Run the phase decision over the current tracking payload and
    /// persisted install history, then act on it.
    async fn assess(&mut self) {
        if !self.cfg.cutover_reached(Utc::now().date_naive()) {
            debug!("cutover date not reached; forcing native journal");
            tokio::time::sleep(self.timers.cutover_delay).await;
            self.deactivate();
            return;
        }
        if self.tracking.is_empty() {
            self.cached_log_fallback();
            return;
        }
        let app_state = self.app_state();
        if app_state.as_deref() == Some(APP_STATE_INACTIVE) {
            self.deactivate();
            return;
        }
        let initial = !self.has_run_previously();
        let interim = self.temp_url();
        let phase = resolve_phase(
            &self.tracking,
            initial,
            self.log_url.as_ref(),
            interim.as_deref(),
            app_state.as_deref(),
        );
        debug!(phase = phase.as_str(), initial, "phase resolved");
        match phase {
            Phase::Setup if initial => {
                // Smooth the race with SDK initialization on first run.
                tokio::time::sleep(self.timers.first_run_hold).await;
                self.fetch_attribution().await;
            }
            Phase::Operational => {
                // Consume the parked link; at-most-once delivery.
                let parked = self.take_temp_url().and_then(|s| Url::parse(&s).ok());
                match parked {
                    Some(url) => {
                        self.log_url = Some(url);
                        self.commit(Phase::Operational);
                    }
                    None => self.cached_log_fallback(),
                }
            }
            Phase::Setup => {
                if self.log_url.is_none() {
                    // A URL cached by an earlier session short-circuits
                    // the fetch.
                    self.log_url = self.stored_log_url();
                }
                if self.gate_should_prompt() {
                    self.show_prompt();
                } else if self.log_url.is_some() {
                    self.commit(Phase::Operational);
                } else {
                    self.config_setup().await;
                }
            }
            Phase::Legacy | Phase::Disconnected => self.deactivate(),
        }
    }

    async fn fetch_attribution(&mut self) {
        let link = self.link_data.clone();
        match self.attribution.fetch_organic(&link).await {
            Ok(merged) => {
                self.tracking = merged;
                self.config_setup().await;
            }
            Err(err) => {
                warn!(%err, "attribution fetch failed");
                self.deactivate();
            }
        }
    }

    async fn config_setup(&mut self) {
        match self.config.fetch_config(&self.tracking).await {
            Ok(url) => self.cache_successful(url),
            Err(err) => {
                warn!(%err, "config fetch failed; falling back to cached log");
                self.cached_log_fallback();
            }
        }
    }

    fn cache_successful(&mut self, url: Url) {
        if let Err(err) = self.store.store_log(url.as_str()) {
            warn!(%err, "failed to persist log url");
        }
        if let Err(err) = self.store.set_app_state(APP_STATE_LOG_VIEW) {
            warn!(%err, "failed to persist app state");
        }
        if let Err(err) = self.store.mark_as_run() {
            warn!(%err, "failed to mark first run");
        }
        self.log_url = Some(url);
        if self.gate_should_prompt() {
            self.show_prompt();
        } else {
            self.commit(Phase::Operational);
        }
    }

    fn cached_log_fallback(&mut self) {
        match self.stored_log_url() {
            Some(url) => {
                self.log_url = Some(url);
                self.commit(Phase::Operational);
            }
            None => self.deactivate(),
        }
    }

    /// Permanent fallback to the native journal.
    fn deactivate(&mut self) {
        if let Err(err) = self.store.set_app_state(APP_STATE_INACTIVE) {
            warn!(%err, "failed to persist app state");
        }
        if let Err(err) = self.store.mark_as_run() {
            warn!(%err, "failed to mark first run");
        }
        self.commit(Phase::Legacy);
    }

    fn show_prompt(&mut self) {
        self.prompt_visible = true;
        self.bus.publish(TOPIC_PERMS_PROMPT_REQUESTED, &json!({}));
        self.push_snapshot();
    }

    fn commit(&mut self, phase: Phase) {
        self.phase = phase;
        self.prompt_visible = false;
        info!(phase = phase.as_str(), "phase committed");
        self.bus.publish(
            TOPIC_PHASE_CHANGED,
            &json!({
                "phase": phase.as_str(),
                "url": self.log_url.as_ref().map(|u| u.as_str()),
            }),
        );
        self.push_snapshot();
    }

    fn push_snapshot(&self) {
        self.snapshot.send_replace(PhaseSnapshot {
            phase: self.phase,
            log_url: self.log_url.clone(),
            prompt_visible: self.prompt_visible,
            updated_at: Utc::now(),
        });
    }

    // Store reads degrade with a warning; no error leaves the pipeline.

    fn app_state(&self) -> Option<String> {
        self.store.app_state().unwrap_or_else(|err| {
            warn!(%err, "app state read failed");
            None
        })
    }

    fn has_run_previously(&self) -> bool {
        self.store.has_run_previously().unwrap_or_else(|err| {
            warn!(%err, "run history read failed");
            false
        })
    }

    fn temp_url(&self) -> Option<String> {
        self.store.temp_url().unwrap_or_else(|err| {
            warn!(%err, "temp url read failed");
            None
        })
    }

    fn take_temp_url(&self) -> Option<String> {
        self.store.take_temp_url().unwrap_or_else(|err| {
            warn!(%err, "temp url take failed");
            None
        })
    }

    fn stored_log_url(&self) -> Option<Url> {
        self.store
            .stored_log()
            .unwrap_or_else(|err| {
                warn!(%err, "stored log read failed");
                None
            })
            .and_then(|s| Url::parse(&s).ok())
    }

    fn gate_should_prompt(&self) -> bool {
        self.gate.should_prompt().unwrap_or_else(|err| {
            warn!(%err, "permission gate read failed");
            false
        })
    }
}
