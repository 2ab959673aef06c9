// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Locally held model credentials and the active selection.
//!
//! The set is owned by the control panel and persisted through a
//! [`CredentialStore`](crate::store::CredentialStore).  Field names
//! serialize in camelCase so the stored file keeps the layout the panel has
//! always written.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CredentialError;
use crate::provider::normalize_provider;

/// One named binding of provider + model + key + base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCredential {
    pub id: String,
    pub name: String,
    /// Provider as entered by the operator.  Grouping uses
    /// [`ModelCredential::provider_key`].
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds; bumped by every update.
    pub updated_at: i64,
}

impl ModelCredential {
    pub fn provider_key(&self) -> String {
        normalize_provider(&self.provider)
    }

    /// `"<provider>/<modelId>"`, the form used for `agents.defaults.model.primary`.
    pub fn primary_ref(&self) -> String {
        format!("{}/{}", self.provider_key(), self.model_id)
    }
}

/// The edit form for a credential.  Every field is trimmed on save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialDraft {
    pub name: String,
    pub provider: String,
    pub model_id: String,
    pub api_key: String,
    pub base_url: String,
}

impl CredentialDraft {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            model_id: model_id.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn validated(&self) -> Result<CredentialDraft, CredentialError> {
        let draft = CredentialDraft {
            name: self.name.trim().to_string(),
            provider: self.provider.trim().to_string(),
            model_id: self.model_id.trim().to_string(),
            api_key: self.api_key.trim().to_string(),
            base_url: self.base_url.trim().to_string(),
        };
        if draft.name.is_empty() {
            return Err(CredentialError::MissingField("name"));
        }
        if draft.provider.is_empty() {
            return Err(CredentialError::MissingField("provider"));
        }
        if draft.model_id.is_empty() {
            return Err(CredentialError::MissingField("modelId"));
        }
        Ok(draft)
    }
}

/// The full credential set plus the active selection.
///
/// Invariant: `active_model_id`, when set, names a credential in `models`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentModelsData {
    #[serde(default)]
    pub models: Vec<ModelCredential>,
    #[serde(default)]
    pub active_model_id: Option<String>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl AgentModelsData {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ModelCredential> {
        self.models.iter().find(|m| m.id == id)
    }

    /// The credential the active selection points at, if any.
    pub fn active(&self) -> Option<&ModelCredential> {
        self.active_model_id.as_deref().and_then(|id| self.get(id))
    }

    /// Append a new credential.  It becomes active when nothing else is.
    pub fn add(&mut self, draft: &CredentialDraft) -> Result<&ModelCredential, CredentialError> {
        let draft = draft.validated()?;
        let now = now_ms();
        let credential = ModelCredential {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            provider: draft.provider,
            model_id: draft.model_id,
            api_key: draft.api_key,
            base_url: draft.base_url,
            created_at: now,
            updated_at: now,
        };
        let id = credential.id.clone();
        if self.active_model_id.is_none() {
            self.active_model_id = Some(id.clone());
        }
        self.models.push(credential);
        self.models.last().ok_or(CredentialError::UnknownCredential(id))
    }

    /// Replace the editable fields of credential `id` and bump `updatedAt`.
    pub fn update(
        &mut self,
        id: &str,
        draft: &CredentialDraft,
    ) -> Result<&ModelCredential, CredentialError> {
        let draft = draft.validated()?;
        let credential = self
            .models
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| CredentialError::UnknownCredential(id.to_string()))?;
        credential.name = draft.name;
        credential.provider = draft.provider;
        credential.model_id = draft.model_id;
        credential.api_key = draft.api_key;
        credential.base_url = draft.base_url;
        credential.updated_at = now_ms().max(credential.updated_at);
        Ok(credential)
    }

    /// Remove credential `id`.  If it was active the selection falls back to
    /// the first remaining credential, or to none.
    pub fn remove(&mut self, id: &str) -> Option<ModelCredential> {
        let pos = self.models.iter().position(|m| m.id == id)?;
        let removed = self.models.remove(pos);
        if self.active_model_id.as_deref() == Some(id) {
            self.active_model_id = self.models.first().map(|m| m.id.clone());
        }
        Some(removed)
    }

    /// Point the active selection at `id`, or clear it with `None`.
    pub fn set_active(&mut self, id: Option<&str>) -> Result<(), CredentialError> {
        match id {
            Some(id) if self.get(id).is_none() => {
                Err(CredentialError::UnknownCredential(id.to_string()))
            }
            Some(id) => {
                self.active_model_id = Some(id.to_string());
                Ok(())
            }
            None => {
                self.active_model_id = None;
                Ok(())
            }
        }
    }

    /// Seed an empty set with the stock OpenAI credential and make it active.
    /// Returns `false` (and changes nothing) when credentials already exist.
    pub fn seed_default(&mut self) -> bool {
        if !self.models.is_empty() {
            return false;
        }
        let draft = CredentialDraft::new("Default Model", "openai", "gpt-4");
        // The stock draft always validates.
        let added = self.add(&draft).map(|c| c.id.clone());
        if let Ok(id) = added {
            self.active_model_id = Some(id);
        }
        true
    }

    /// Drop a dangling selection left behind by an externally edited file.
    pub fn repair_selection(&mut self) -> bool {
        match self.active_model_id.as_deref() {
            Some(id) if self.get(id).is_none() => {
                self.active_model_id = self.models.first().map(|m| m.id.clone());
                true
            }
            _ => false,
        }
    }
}
