// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! In-process gateway holding a single configuration document.
//!
//! Answers the four RPC methods the coordination layer uses, with the same
//! base-hash and merge-patch rules as the real gateway.  Intended for tests
//! and for driving the syncer without a network transport.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::channel::{
    GatewayChannel, CONFIG_GET, CONFIG_PATCH, CONTENT_AUDIT_RESOLVE, EXEC_APPROVAL_RESOLVE,
};
use crate::error::ChannelError;
use crate::patch::merge_patch;

pub const ERROR_INVALID_REQUEST: &str = "INVALID_REQUEST";
pub const ERROR_METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";

/// Hex-encoded SHA-256 of a raw document; the gateway's concurrency token.
pub fn content_hash(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDecision {
    pub method: String,
    pub id: String,
    pub decision: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    pub delay_ms: u64,
    pub note: String,
}

#[derive(Default)]
struct Inner {
    disconnected: bool,
    path: Option<String>,
    raw: Option<String>,
    calls: Vec<RecordedCall>,
    decisions: Vec<RecordedDecision>,
    restarts: Vec<RestartRequest>,
    fail_next: HashMap<String, ChannelError>,
    /// Merge-patch applied to the document right before the next
    /// `config.patch` is checked, as if another client wrote first.
    interleaved_edit: Option<Value>,
}

#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatchParams {
    raw: Option<String>,
    #[serde(default)]
    base_hash: Option<String>,
    #[serde(default)]
    restart_delay_ms: Option<u64>,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Deserialize)]
struct ResolveParams {
    #[serde(default)]
    id: String,
    #[serde(default)]
    decision: String,
}

fn invalid(message: impl Into<String>) -> ChannelError {
    ChannelError::rejected(ERROR_INVALID_REQUEST, message)
}

impl MemoryGateway {
    /// A connected gateway with no configuration document.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connected gateway whose document is `document`.
    pub fn with_document(document: Value) -> Self {
        let gw = Self::new();
        gw.set_document(document);
        gw
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Recover the data from a poisoned lock; a panicking test thread must
        // not cascade into every other assertion.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().disconnected = !connected;
    }

    pub fn set_path(&self, path: impl Into<String>) {
        self.lock().path = Some(path.into());
    }

    pub fn set_document(&self, document: Value) {
        self.lock().raw = Some(render(&document));
    }

    /// Replace the stored text verbatim, e.g. with something unparseable.
    pub fn set_raw(&self, raw: impl Into<String>) {
        self.lock().raw = Some(raw.into());
    }

    pub fn clear_document(&self) {
        self.lock().raw = None;
    }

    pub fn raw(&self) -> Option<String> {
        self.lock().raw.clone()
    }

    /// The stored document, if it exists and parses.
    pub fn document(&self) -> Option<Value> {
        self.lock()
            .raw
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn hash(&self) -> Option<String> {
        self.lock().raw.as_deref().map(content_hash)
    }

    /// Make the next call of `method` fail with `error`.
    pub fn fail_next(&self, method: &str, error: ChannelError) {
        self.lock().fail_next.insert(method.to_string(), error);
    }

    /// Apply `edit` to the document just before the next `config.patch` is
    /// evaluated.
    pub fn edit_before_next_patch(&self, edit: Value) {
        self.lock().interleaved_edit = Some(edit);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.method == method).count()
    }

    pub fn decisions(&self) -> Vec<RecordedDecision> {
        self.lock().decisions.clone()
    }

    pub fn restarts(&self) -> Vec<RestartRequest> {
        self.lock().restarts.clone()
    }

    fn config_get(inner: &Inner) -> Value {
        json!({
            "path": inner.path,
            "exists": inner.raw.is_some(),
            "raw": inner.raw,
            "hash": inner.raw.as_deref().map(content_hash),
        })
    }

    fn config_patch(inner: &mut Inner, params: Value) -> Result<Value, ChannelError> {
        if let Some(edit) = inner.interleaved_edit.take() {
            let current = parse_stored(inner.raw.as_deref())?;
            inner.raw = Some(render(&merge_patch(current, edit)));
        }

        let params: PatchParams =
            serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?;

        if let Some(current_raw) = inner.raw.as_deref() {
            let base_hash = params
                .base_hash
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| invalid("config base hash required; re-run config.get and retry"))?;
            if base_hash != content_hash(current_raw) {
                return Err(invalid(
                    "config changed since last load; re-run config.get and retry",
                ));
            }
        }

        let raw = params.raw.ok_or_else(|| invalid("raw is required"))?;
        let patch: Value = serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
        if !patch.is_object() {
            return Err(invalid("config.patch raw must be an object"));
        }

        let current = parse_stored(inner.raw.as_deref())?;
        let merged = merge_patch(current, patch);
        let rendered = render(&merged);
        let hash = content_hash(&rendered);
        inner.raw = Some(rendered);

        let delay_ms = params.restart_delay_ms.unwrap_or(0);
        inner.restarts.push(RestartRequest {
            delay_ms,
            note: params.note.unwrap_or_default(),
        });

        Ok(json!({
            "ok": true,
            "path": inner.path,
            "hash": hash,
            "restart": { "delayMs": delay_ms },
        }))
    }

    fn resolve(inner: &mut Inner, method: &str, params: Value) -> Result<Value, ChannelError> {
        let params: ResolveParams =
            serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?;
        if params.id.trim().is_empty() {
            return Err(invalid("id is required"));
        }
        if params.decision.trim().is_empty() {
            return Err(invalid("decision is required"));
        }
        inner.decisions.push(RecordedDecision {
            method: method.to_string(),
            id: params.id,
            decision: params.decision,
        });
        Ok(json!({ "ok": true }))
    }
}

fn render(document: &Value) -> String {
    serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string())
}

fn parse_stored(raw: Option<&str>) -> Result<Value, ChannelError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(json!({})),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| invalid(format!("stored config is not valid JSON: {e}"))),
    }
}

#[async_trait]
impl GatewayChannel for MemoryGateway {
    fn is_connected(&self) -> bool {
        !self.lock().disconnected
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ChannelError> {
        let mut inner = self.lock();
        if inner.disconnected {
            return Err(ChannelError::NotConnected);
        }
        inner.calls.push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
        });
        if let Some(err) = inner.fail_next.remove(method) {
            return Err(err);
        }
        match method {
            CONFIG_GET => Ok(Self::config_get(&inner)),
            CONFIG_PATCH => Self::config_patch(&mut inner, params),
            EXEC_APPROVAL_RESOLVE | CONTENT_AUDIT_RESOLVE => {
                Self::resolve(&mut inner, method, params)
            }
            other => Err(ChannelError::rejected(
                ERROR_METHOD_NOT_FOUND,
                format!("unknown method: {other}"),
            )),
        }
    }
}
