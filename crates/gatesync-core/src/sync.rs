// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Optimistic-concurrency config sync.
//!
//! One `sync()` call is one fetch → build → submit round.  The gateway is the
//! only judge of conflicts: the fetched hash travels back as `baseHash` and a
//! rejected patch is reported, never retried here.  Running `sync()` again
//! fetches a fresh hash.

use std::sync::Arc;

use gatesync_config::SyncConfig;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::channel::{request_typed, GatewayChannel, CONFIG_GET, CONFIG_PATCH};
use crate::credentials::AgentModelsData;
use crate::error::{ChannelError, SyncError};
use crate::merge::merge_credentials;
use crate::patch::{ConfigPatchBuilder, RemoteConfigSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub restart_delay_ms: u64,
    pub note: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            restart_delay_ms: cfg.restart_delay_ms,
            note: cfg.note.clone(),
        }
    }
}

/// Externally observable status of the syncer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub syncing: bool,
    /// User-facing message from the most recent failed attempt.  Cleared when
    /// a new attempt starts.
    pub last_error: Option<String>,
    /// Set after a successful patch: the gateway will restart shortly.
    pub restart_pending: bool,
}

/// What a successful sync submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub base_hash: String,
    /// Provider keys written to `models.providers`, in order.
    pub providers: Vec<String>,
    /// Value written to `agents.defaults.model.primary`, if any.
    pub primary: Option<String>,
}

pub struct ConfigSyncer {
    channel: Arc<dyn GatewayChannel>,
    builder: ConfigPatchBuilder,
    in_flight: Mutex<()>,
    state: watch::Sender<SyncState>,
}

impl ConfigSyncer {
    pub fn new(channel: Arc<dyn GatewayChannel>, options: SyncOptions) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            channel,
            builder: ConfigPatchBuilder::new(options.restart_delay_ms, options.note),
            in_flight: Mutex::new(()),
            state,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Acknowledge the pending restart (e.g. after the gateway reconnected).
    pub fn clear_restart_pending(&self) {
        self.state.send_modify(|s| s.restart_pending = false);
    }

    /// Push the local credential set to the gateway.
    ///
    /// Every failure is also recorded in [`SyncState::last_error`], except
    /// [`SyncError::InProgress`], which leaves the running attempt's state
    /// alone.
    pub async fn sync(&self, data: &AgentModelsData) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("config sync already running; ignoring request");
            return Err(SyncError::InProgress);
        };

        if !self.channel.is_connected() {
            let err = SyncError::NotConnected;
            warn!("config sync skipped: {err}");
            self.state
                .send_modify(|s| s.last_error = Some(err.to_string()));
            return Err(err);
        }

        self.state.send_modify(|s| {
            s.syncing = true;
            s.last_error = None;
        });
        info!(credentials = data.models.len(), "config sync started");

        let result = self.run(data).await;

        self.state.send_modify(|s| {
            s.syncing = false;
            match &result {
                Ok(_) => s.restart_pending = true,
                Err(e) => s.last_error = Some(e.to_string()),
            }
        });
        match &result {
            Ok(report) => info!(
                providers = report.providers.len(),
                primary = report.primary.as_deref().unwrap_or("-"),
                "config sync finished; gateway restart pending"
            ),
            Err(e) => warn!("config sync failed: {e}"),
        }
        result
    }

    async fn run(&self, data: &AgentModelsData) -> Result<SyncReport, SyncError> {
        let snapshot: Option<RemoteConfigSnapshot> =
            request_typed(self.channel.as_ref(), CONFIG_GET, json!({}))
                .await
                .map_err(SyncError::Transport)?;
        let snapshot = match snapshot {
            Some(snapshot) if snapshot.exists => snapshot,
            _ => return Err(SyncError::NoRemoteConfig),
        };

        let fragment = merge_credentials(&data.models);
        let active = data.active();
        let patch = self.builder.build(&snapshot, &fragment, active)?;

        debug!(
            base_hash = %patch.base_hash,
            providers = fragment.len(),
            "submitting config patch"
        );
        self.channel
            .request(CONFIG_PATCH, patch.to_params())
            .await
            .map_err(|e| match e {
                ChannelError::Rejected { .. } => SyncError::Conflict(e.to_string()),
                other => SyncError::Transport(other),
            })?;

        Ok(SyncReport {
            base_hash: patch.base_hash,
            providers: fragment.keys().map(str::to_string).collect(),
            primary: active.map(|c| c.primary_ref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialDraft;
    use crate::memory::MemoryGateway;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn one_anthropic() -> AgentModelsData {
        let mut d = AgentModelsData::default();
        d.add(&CredentialDraft::new("Claude", "anthropic", "claude-3").with_api_key("k1"))
            .unwrap();
        d
    }

    fn syncer(gw: &Arc<MemoryGateway>) -> ConfigSyncer {
        ConfigSyncer::new(gw.clone(), SyncOptions::default())
    }

    #[tokio::test]
    async fn successful_sync_updates_document_and_sets_restart_pending() {
        let gw = Arc::new(MemoryGateway::with_document(json!({"gateway": {"port": 1}})));
        let s = syncer(&gw);
        let report = s.sync(&one_anthropic()).await.unwrap();
        assert_eq!(report.providers, vec!["anthropic"]);
        assert_eq!(report.primary.as_deref(), Some("anthropic/claude-3"));

        let doc = gw.document().unwrap();
        assert_eq!(doc["gateway"]["port"], 1);
        assert_eq!(doc["models"]["providers"]["anthropic"]["apiKey"], "k1");
        assert_eq!(doc["agents"]["defaults"]["model"]["primary"], "anthropic/claude-3");

        let state = s.state();
        assert!(!state.syncing);
        assert!(state.restart_pending);
        assert_eq!(state.last_error, None);
        assert_eq!(gw.restarts()[0].delay_ms, 1000);
    }

    #[tokio::test]
    async fn not_connected_fails_without_network() {
        let gw = Arc::new(MemoryGateway::with_document(json!({})));
        gw.set_connected(false);
        let s = syncer(&gw);
        assert_eq!(s.sync(&one_anthropic()).await.unwrap_err(), SyncError::NotConnected);
        assert!(gw.calls().is_empty());
        assert_eq!(s.state().last_error.as_deref(), Some("not connected to gateway"));
    }

    #[tokio::test]
    async fn missing_document_is_no_remote_config() {
        let gw = Arc::new(MemoryGateway::new());
        let s = syncer(&gw);
        assert_eq!(s.sync(&one_anthropic()).await.unwrap_err(), SyncError::NoRemoteConfig);
        assert_eq!(gw.call_count(CONFIG_PATCH), 0);
    }

    /// Answers `config.get` with an empty payload.
    struct NullSnapshotChannel;

    #[async_trait]
    impl GatewayChannel for NullSnapshotChannel {
        fn is_connected(&self) -> bool {
            true
        }
        async fn request(&self, method: &str, _params: Value) -> Result<Value, ChannelError> {
            match method {
                CONFIG_GET => Ok(Value::Null),
                other => Err(ChannelError::Transport(format!("unexpected {other}"))),
            }
        }
    }

    #[tokio::test]
    async fn null_snapshot_is_no_remote_config() {
        let s = ConfigSyncer::new(Arc::new(NullSnapshotChannel), SyncOptions::default());
        assert_eq!(s.sync(&one_anthropic()).await.unwrap_err(), SyncError::NoRemoteConfig);
        assert_eq!(
            s.state().last_error.as_deref(),
            Some(SyncError::NoRemoteConfig.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn malformed_document_submits_nothing() {
        let gw = Arc::new(MemoryGateway::new());
        gw.set_raw("{not json");
        let s = syncer(&gw);
        let err = s.sync(&one_anthropic()).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedRemoteDocument(_)));
        assert_eq!(gw.call_count(CONFIG_PATCH), 0);
        assert!(!s.state().restart_pending);
        assert!(s.state().last_error.is_some());
    }

    #[tokio::test]
    async fn stale_hash_is_conflict_and_local_set_is_untouched() {
        let gw = Arc::new(MemoryGateway::with_document(json!({"a": 1})));
        gw.edit_before_next_patch(json!({"b": 2}));
        let s = syncer(&gw);
        let data = one_anthropic();
        let before = data.clone();
        let err = s.sync(&data).await.unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)), "{err:?}");
        assert_eq!(data, before);
        assert!(gw.document().unwrap().get("models").is_none());

        // A second attempt re-fetches the hash and goes through.
        s.sync(&data).await.unwrap();
        assert_eq!(gw.call_count(CONFIG_GET), 2);
    }

    #[tokio::test]
    async fn transport_failure_on_fetch_is_transport_error() {
        let gw = Arc::new(MemoryGateway::with_document(json!({})));
        gw.fail_next(CONFIG_GET, ChannelError::Transport("socket closed".into()));
        let s = syncer(&gw);
        let err = s.sync(&one_anthropic()).await.unwrap_err();
        assert_eq!(
            err,
            SyncError::Transport(ChannelError::Transport("socket closed".into()))
        );
        assert_eq!(
            s.state().last_error.as_deref(),
            Some("sync failed: transport error: socket closed")
        );
    }

    #[tokio::test]
    async fn new_attempt_clears_previous_error() {
        let gw = Arc::new(MemoryGateway::with_document(json!({})));
        gw.fail_next(CONFIG_PATCH, ChannelError::Transport("eof".into()));
        let s = syncer(&gw);
        assert!(s.sync(&one_anthropic()).await.is_err());
        assert!(s.state().last_error.is_some());
        s.sync(&one_anthropic()).await.unwrap();
        assert_eq!(s.state().last_error, None);
    }

    #[tokio::test]
    async fn subscribers_see_terminal_state() {
        let gw = Arc::new(MemoryGateway::with_document(json!({})));
        let s = syncer(&gw);
        let mut rx = s.subscribe();
        s.sync(&one_anthropic()).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().restart_pending);
        s.clear_restart_pending();
        assert!(!rx.borrow_and_update().restart_pending);
    }

    /// Holds every `config.get` until released.
    struct GatedChannel {
        gate: Notify,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl GatewayChannel for GatedChannel {
        fn is_connected(&self) -> bool {
            true
        }
        async fn request(&self, method: &str, _params: Value) -> Result<Value, ChannelError> {
            if method == CONFIG_GET {
                self.gets.fetch_add(1, Ordering::SeqCst);
                self.gate.notified().await;
                return Ok(json!({"exists": true, "raw": "{}", "hash": "h"}));
            }
            Ok(json!({"ok": true}))
        }
    }

    #[tokio::test]
    async fn overlapping_sync_is_refused() {
        let ch = Arc::new(GatedChannel {
            gate: Notify::new(),
            gets: AtomicUsize::new(0),
        });
        let s = Arc::new(ConfigSyncer::new(ch.clone(), SyncOptions::default()));
        let data = one_anthropic();

        let first = {
            let s = s.clone();
            let data = data.clone();
            tokio::spawn(async move { s.sync(&data).await })
        };
        while ch.gets.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(s.state().syncing);

        assert_eq!(s.sync(&data).await.unwrap_err(), SyncError::InProgress);
        assert!(s.state().syncing, "refused call must not touch state");

        ch.gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(ch.gets.load(Ordering::SeqCst), 1);
        assert!(!s.state().syncing);
    }
}
