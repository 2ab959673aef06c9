// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Build the `config.patch` payload from a freshly fetched remote document.
//!
//! The gateway applies `raw` to its document with JSON merge-patch
//! semantics (RFC 7396) after checking `baseHash`.  The builder only ever
//! touches two places:
//!
//! - `models.providers`: replaced wholesale by the local provider fragment.
//!   Remote providers (and provider fields) that the fragment does not carry
//!   are sent as `null` so merge-patch removes them.
//! - `agents.defaults.model.primary`: set from the active credential.  With
//!   no active credential `agents` is left out of the patch.
//!
//! Everything else in the remote document is left exactly as it was.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::credentials::ModelCredential;
use crate::error::PatchError;
use crate::merge::ProviderFragment;

/// Response of `config.get`.  Fetched fresh for every sync attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfigSnapshot {
    #[serde(default)]
    pub raw: Option<String>,
    /// Concurrency token for the exact document version in `raw`.
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub exists: bool,
}

impl RemoteConfigSnapshot {
    /// Parse `raw` as a JSON object.  A missing or blank document counts as `{}`.
    pub fn parse(&self) -> Result<Map<String, Value>, PatchError> {
        let raw = self.raw.as_deref().unwrap_or("").trim();
        if raw.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(PatchError::MalformedRemoteDocument(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
            Err(e) => Err(PatchError::MalformedRemoteDocument(e.to_string())),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parameters of one `config.patch` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    /// Serialized JSON merge-patch document.
    pub raw: String,
    pub base_hash: String,
    pub restart_delay_ms: u64,
    pub note: String,
}

impl ConfigPatch {
    /// Request params for `config.patch`.
    pub fn to_params(&self) -> Value {
        serde_json::json!({
            "raw": self.raw,
            "baseHash": self.base_hash,
            "restartDelayMs": self.restart_delay_ms,
            "note": self.note,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPatchBuilder {
    restart_delay_ms: u64,
    note: String,
}

impl ConfigPatchBuilder {
    pub fn new(restart_delay_ms: u64, note: impl Into<String>) -> Self {
        Self {
            restart_delay_ms,
            note: note.into(),
        }
    }

    /// Build the patch for `snapshot`.  Fails without producing anything if
    /// the remote document does not parse.
    pub fn build(
        &self,
        snapshot: &RemoteConfigSnapshot,
        fragment: &ProviderFragment,
        active: Option<&ModelCredential>,
    ) -> Result<ConfigPatch, PatchError> {
        let remote = snapshot.parse()?;
        let document = patch_document(&remote, fragment, active);
        let raw = serde_json::to_string(&document)
            .map_err(|e| PatchError::MalformedRemoteDocument(e.to_string()))?;
        Ok(ConfigPatch {
            raw,
            base_hash: snapshot.hash.clone().unwrap_or_default(),
            restart_delay_ms: self.restart_delay_ms,
            note: self.note.clone(),
        })
    }
}

/// The merge-patch object for `remote`.
pub fn patch_document(
    remote: &Map<String, Value>,
    fragment: &ProviderFragment,
    active: Option<&ModelCredential>,
) -> Value {
    let mut patch = Map::new();

    let remote_providers = remote
        .get("models")
        .and_then(|m| m.get("providers"))
        .and_then(Value::as_object);
    let mut models = Map::new();
    models.insert(
        "providers".into(),
        Value::Object(providers_patch(fragment, remote_providers)),
    );
    patch.insert("models".into(), Value::Object(models));

    if let Some(active) = active {
        patch.insert(
            "agents".into(),
            json!({"defaults": {"model": {"primary": active.primary_ref()}}}),
        );
    }

    Value::Object(patch)
}

/// Fragment entries plus `null` tombstones for whatever the remote side has
/// that the fragment does not, so the applied result equals the fragment.
fn providers_patch(
    fragment: &ProviderFragment,
    remote: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut out = match fragment.to_value() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let Some(remote) = remote else {
        return out;
    };

    for (key, remote_provider) in remote {
        match out.get_mut(key) {
            None => {
                out.insert(key.clone(), Value::Null);
            }
            Some(Value::Object(local)) => {
                if let Some(remote_fields) = remote_provider.as_object() {
                    for field in remote_fields.keys() {
                        if !local.contains_key(field) {
                            local.insert(field.clone(), Value::Null);
                        }
                    }
                }
            }
            Some(_) => {}
        }
    }
    out
}

/// Apply `patch` to `base` with JSON merge-patch semantics (RFC 7396):
/// objects merge key by key, `null` deletes, anything else replaces.
pub fn merge_patch(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    base_map.remove(&key);
                } else if let Some(slot) = base_map.get_mut(&key) {
                    let current = std::mem::take(slot);
                    *slot = merge_patch(current, patch_value);
                } else {
                    base_map.insert(key, merge_patch(Value::Null, patch_value));
                }
            }
            Value::Object(base_map)
        }
        (_, Value::Object(patch_map)) => {
            merge_patch(Value::Object(Map::new()), Value::Object(patch_map))
        }
        (_, patch_value) => patch_value,
    }
}
