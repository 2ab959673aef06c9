// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Config sync against the in-memory gateway: a realistic gateway document,
//! repeated syncs, and a concurrent writer on the gateway side.

use std::sync::Arc;

use gatesync_core::channel::{CONFIG_GET, CONFIG_PATCH};
use gatesync_core::{
    merge_patch, AgentModelsData, ConfigSyncer, CredentialDraft, MemoryGateway, SyncError,
    SyncOptions,
};
use serde_json::{json, Value};

fn gateway_document() -> Value {
    json!({
        "gateway": {"port": 18789, "bind": "loopback", "auth": {"token": "secret"}},
        "channels": {"telegram": {"enabled": true, "dmPolicy": "pairing"}},
        "models": {
            "mode": "merge",
            "providers": {
                "openai": {"baseUrl": "https://api.openai.com/v1", "apiKey": "sk-old", "models": []},
                "ollama": {"baseUrl": "http://localhost:11434/v1", "models": []}
            }
        },
        "agents": {
            "defaults": {
                "model": {"primary": "ollama/llama3", "fallbacks": ["openai/gpt-4o-mini"]},
                "workspace": "~/agent"
            },
            "list": [{"id": "main", "default": true}]
        }
    })
}

fn credentials() -> AgentModelsData {
    let mut d = AgentModelsData::default();
    d.add(&CredentialDraft::new("GPT-4o", "OpenAI", "gpt-4o").with_api_key("sk-new"))
        .unwrap();
    d.add(&CredentialDraft::new("Claude", "anthropic", "claude-3").with_api_key("k1"))
        .unwrap();
    d.add(&CredentialDraft::new("GPT-4", "openai", "gpt-4")).unwrap();
    let claude = d.models[1].id.clone();
    d.set_active(Some(&claude)).unwrap();
    d
}

#[tokio::test]
async fn sync_rewrites_only_owned_keys() {
    let before = gateway_document();
    let gw = Arc::new(MemoryGateway::with_document(before.clone()));
    let syncer = ConfigSyncer::new(gw.clone(), SyncOptions::default());

    let report = syncer.sync(&credentials()).await.unwrap();
    assert_eq!(report.providers, vec!["openai", "anthropic"]);
    assert_eq!(report.primary.as_deref(), Some("anthropic/claude-3"));

    let after = gw.document().unwrap();
    assert_eq!(after["gateway"], before["gateway"]);
    assert_eq!(after["channels"], before["channels"]);
    assert_eq!(after["models"]["mode"], "merge");
    assert_eq!(after["agents"]["list"], before["agents"]["list"]);
    assert_eq!(after["agents"]["defaults"]["workspace"], "~/agent");
    assert_eq!(
        after["agents"]["defaults"]["model"],
        json!({"primary": "anthropic/claude-3", "fallbacks": ["openai/gpt-4o-mini"]})
    );

    let providers = after["models"]["providers"].as_object().unwrap();
    assert_eq!(providers.len(), 2);
    assert!(providers.get("ollama").is_none());
    assert_eq!(providers["openai"]["apiKey"], "sk-new");
    assert_eq!(providers["openai"]["models"].as_array().unwrap().len(), 2);
    assert_eq!(providers["anthropic"]["api"], "anthropic-messages");
}

#[tokio::test]
async fn patch_params_carry_hash_delay_and_note() {
    let gw = Arc::new(MemoryGateway::with_document(gateway_document()));
    let hash = gw.hash().unwrap();
    let syncer = ConfigSyncer::new(
        gw.clone(),
        SyncOptions {
            restart_delay_ms: 2500,
            note: "rotated keys".into(),
        },
    );
    let report = syncer.sync(&credentials()).await.unwrap();
    assert_eq!(report.base_hash, hash);

    let calls = gw.calls();
    assert_eq!(calls[0].method, CONFIG_GET);
    assert_eq!(calls[1].method, CONFIG_PATCH);
    assert_eq!(calls[1].params["baseHash"], hash);
    assert_eq!(calls[1].params["restartDelayMs"], 2500);
    assert_eq!(calls[1].params["note"], "rotated keys");

    let restart = &gw.restarts()[0];
    assert_eq!(restart.delay_ms, 2500);
    assert_eq!(restart.note, "rotated keys");
}

#[tokio::test]
async fn patch_matches_local_merge_patch() {
    let before = gateway_document();
    let gw = Arc::new(MemoryGateway::with_document(before.clone()));
    let syncer = ConfigSyncer::new(gw.clone(), SyncOptions::default());
    syncer.sync(&credentials()).await.unwrap();

    let raw = gw.calls()[1].params["raw"].as_str().unwrap().to_string();
    let patch: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(merge_patch(before, patch), gw.document().unwrap());
}

#[tokio::test]
async fn resync_is_stable() {
    let gw = Arc::new(MemoryGateway::with_document(gateway_document()));
    let syncer = ConfigSyncer::new(gw.clone(), SyncOptions::default());
    let data = credentials();
    syncer.sync(&data).await.unwrap();
    let first = gw.document().unwrap();
    syncer.sync(&data).await.unwrap();
    assert_eq!(gw.document().unwrap(), first);
}

#[tokio::test]
async fn concurrent_writer_causes_conflict_then_retry_keeps_their_edit() {
    let gw = Arc::new(MemoryGateway::with_document(gateway_document()));
    let syncer = ConfigSyncer::new(gw.clone(), SyncOptions::default());
    let data = credentials();

    gw.edit_before_next_patch(json!({"channels": {"discord": {"enabled": true}}}));
    let err = syncer.sync(&data).await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(ref m) if m.contains("config changed")));
    assert!(syncer.state().last_error.unwrap().contains("sync again"));
    assert!(!syncer.state().restart_pending);

    syncer.sync(&data).await.unwrap();
    let doc = gw.document().unwrap();
    assert_eq!(doc["channels"]["discord"]["enabled"], true);
    assert_eq!(doc["agents"]["defaults"]["model"]["primary"], "anthropic/claude-3");
    assert!(syncer.state().restart_pending);
}

#[tokio::test]
async fn empty_document_is_treated_as_empty_object() {
    let gw = Arc::new(MemoryGateway::new());
    gw.set_raw("");
    let syncer = ConfigSyncer::new(gw.clone(), SyncOptions::default());
    syncer.sync(&credentials()).await.unwrap();
    let doc = gw.document().unwrap();
    assert_eq!(doc["models"]["providers"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn syncing_an_empty_set_clears_remote_providers() {
    let gw = Arc::new(MemoryGateway::with_document(gateway_document()));
    let syncer = ConfigSyncer::new(gw.clone(), SyncOptions::default());
    let report = syncer.sync(&AgentModelsData::default()).await.unwrap();
    assert!(report.providers.is_empty());
    assert_eq!(report.primary, None);
    let doc = gw.document().unwrap();
    assert_eq!(doc["models"]["providers"], json!({}));
    assert_eq!(doc["agents"]["defaults"]["model"]["primary"], "ollama/llama3");
}
