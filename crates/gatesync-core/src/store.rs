// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Persistence of the local credential set.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing::debug;

use crate::credentials::AgentModelsData;

/// Load/save of the whole credential set.  Every save replaces the stored
/// set completely.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> anyhow::Result<AgentModelsData>;
    fn save(&self, data: &AgentModelsData) -> anyhow::Result<()>;
}

/// Pretty-printed JSON file, readable only by the owner (it holds API keys).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for JsonFileStore {
    /// A missing file is an empty set.
    fn load(&self) -> anyhow::Result<AgentModelsData> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no credential file yet");
            return Ok(AgentModelsData::default());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading credential file {}", self.path.display()))?;
        let data: AgentModelsData = serde_json::from_str(&text)
            .with_context(|| format!("parsing credential file {}", self.path.display()))?;
        debug!(path = %self.path.display(), models = data.models.len(), "credentials loaded");
        Ok(data)
    }

    fn save(&self, data: &AgentModelsData) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("creating credential directory {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(data).context("serializing credentials")?;
        write_private_file(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), models = data.models.len(), "credentials saved");
        Ok(())
    }
}

fn write_private_file(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut f = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("writing credential file {}", path.display()))?;
        f.write_all(data)
            .with_context(|| format!("writing credential file {}", path.display()))?;
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, data)
            .with_context(|| format!("writing credential file {}", path.display()))?;
    }
    Ok(())
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<AgentModelsData>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(data: AgentModelsData) -> Self {
        Self {
            data: Mutex::new(data),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contents(&self) -> AgentModelsData {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> anyhow::Result<AgentModelsData> {
        Ok(self.contents())
    }

    fn save(&self, data: &AgentModelsData) -> anyhow::Result<()> {
        *self.data.lock().unwrap_or_else(|e| e.into_inner()) = data.clone();
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
