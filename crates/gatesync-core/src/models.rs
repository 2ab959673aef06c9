// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Credential editing workflow: mutate → persist → sync.
//!
//! Each edit is computed on a copy of the set, written to the store, and only
//! then committed in memory and pushed to the gateway.  A failed sync never
//! rolls the local change back; the operator re-syncs once the gateway is
//! reachable again.

use std::sync::Arc;

use tracing::{info, warn};

use crate::credentials::{AgentModelsData, CredentialDraft, ModelCredential};
use crate::error::{CredentialError, SyncError};
use crate::store::CredentialStore;
use crate::sync::{ConfigSyncer, SyncReport};

/// Which credential a saved draft applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    New,
    Existing(String),
}

/// A committed local change plus the outcome of the sync that followed it.
#[derive(Debug)]
pub struct ModelChange<T> {
    pub value: T,
    pub sync: Result<SyncReport, SyncError>,
}

pub struct ModelManager<S: CredentialStore> {
    store: S,
    syncer: Arc<ConfigSyncer>,
    data: AgentModelsData,
}

impl<S: CredentialStore> ModelManager<S> {
    /// Load the stored set and seed it with the default credential when it
    /// is empty.  An unreadable store starts from an empty, unseeded set and
    /// is not written back.
    pub fn open(store: S, syncer: Arc<ConfigSyncer>) -> Self {
        let data = match store.load() {
            Ok(mut data) => {
                let mut changed = data.repair_selection();
                if data.seed_default() {
                    info!("no credentials stored; seeded the default model");
                    changed = true;
                }
                if changed {
                    if let Err(e) = store.save(&data) {
                        warn!("failed to save credentials: {e:#}");
                    }
                }
                data
            }
            Err(e) => {
                warn!("failed to load credentials, starting with an empty set: {e:#}");
                AgentModelsData::default()
            }
        };

        Self {
            store,
            syncer,
            data,
        }
    }

    pub fn data(&self) -> &AgentModelsData {
        &self.data
    }

    pub fn syncer(&self) -> &ConfigSyncer {
        &self.syncer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Push the current set without changing it.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        self.syncer.sync(&self.data).await
    }

    /// Create or update a credential from `draft`.
    pub async fn save_credential(
        &mut self,
        target: EditTarget,
        draft: &CredentialDraft,
    ) -> anyhow::Result<ModelChange<ModelCredential>> {
        let mut next = self.data.clone();
        let saved = match &target {
            EditTarget::New => next.add(draft)?.clone(),
            EditTarget::Existing(id) => next.update(id, draft)?.clone(),
        };
        self.commit(next)?;
        info!(id = %saved.id, provider = %saved.provider, "credential saved");
        Ok(self.finish(saved).await)
    }

    pub async fn delete_credential(
        &mut self,
        id: &str,
    ) -> anyhow::Result<ModelChange<ModelCredential>> {
        let mut next = self.data.clone();
        let removed = next
            .remove(id)
            .ok_or_else(|| CredentialError::UnknownCredential(id.to_string()))?;
        self.commit(next)?;
        info!(id, "credential deleted");
        Ok(self.finish(removed).await)
    }

    /// Select credential `id` as the agents' primary model, or clear the
    /// selection with `None`.
    pub async fn set_active(
        &mut self,
        id: Option<&str>,
    ) -> anyhow::Result<ModelChange<Option<String>>> {
        let mut next = self.data.clone();
        next.set_active(id)?;
        self.commit(next)?;
        info!(active = id.unwrap_or("-"), "active model changed");
        let active = self.data.active_model_id.clone();
        Ok(self.finish(active).await)
    }

    fn commit(&mut self, next: AgentModelsData) -> anyhow::Result<()> {
        self.store.save(&next)?;
        self.data = next;
        Ok(())
    }

    async fn finish<T>(&self, value: T) -> ModelChange<T> {
        let sync = self.syncer.sync(&self.data).await;
        ModelChange { value, sync }
    }
}
