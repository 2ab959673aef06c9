// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name of the persisted credential set inside the data directory.
pub const MODELS_FILE_NAME: &str = "agent-models.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_restart_delay_ms() -> u64 {
    1000
}
fn default_note() -> String {
    "model configuration update".into()
}

/// Settings applied to every `config.patch` submitted by the syncer.
///
/// ```toml
/// [sync]
/// restart_delay_ms = 2500
/// note = "credentials rotated from the control panel"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Grace period the gateway waits before restarting to pick up new
    /// provider credentials.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Operator-facing note attached to the patch (shown in the gateway log).
    #[serde(default = "default_note")]
    pub note: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: default_restart_delay_ms(),
            note: default_note(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Location of the credential file.  `~` and `$VARS` are expanded.
    /// Defaults to `$XDG_DATA_HOME/gatesync/agent-models.json`.
    #[serde(default)]
    pub models_file: Option<String>,
}

impl StorageConfig {
    /// Resolve the credential file path, expanding `~` and environment
    /// variables in an explicit setting.
    pub fn models_path(&self) -> PathBuf {
        match &self.models_file {
            Some(raw) => {
                let expanded = shellexpand::full(raw)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| raw.clone());
                PathBuf::from(expanded)
            }
            None => default_data_dir().join(MODELS_FILE_NAME),
        }
    }
}

/// `$XDG_DATA_HOME/gatesync`, falling back to `~/.local/share/gatesync`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("gatesync")
}
