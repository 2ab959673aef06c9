// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Collapse the local credential list into the provider-keyed fragment that
//! replaces `models.providers` on the gateway.
//!
//! Grouping is by normalized provider name in first-seen order.  Group-level
//! settings (base URL, API type, API key) come from the first credential of
//! each group; every credential contributes one model entry.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::credentials::ModelCredential;
use crate::provider::resolve_profile;

pub const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;
pub const DEFAULT_MAX_TOKENS: u32 = 8_192;

/// One model entry under a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderModel {
    pub id: String,
    pub name: String,
    pub reasoning: bool,
    pub input: Vec<String>,
    pub context_window: u32,
    pub max_tokens: u32,
}

impl ProviderModel {
    fn from_credential(c: &ModelCredential) -> Self {
        Self {
            id: c.model_id.clone(),
            name: c.name.clone(),
            reasoning: false,
            input: vec!["text".to_string()],
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub base_url: String,
    pub api: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub models: Vec<ProviderModel>,
}

/// Provider key → provider config, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFragment {
    entries: Vec<(String, ProviderConfig)>,
}

impl ProviderFragment {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, provider_key: &str) -> Option<&ProviderConfig> {
        self.entries
            .iter()
            .find(|(k, _)| k == provider_key)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, provider_key: &str) -> bool {
        self.get(provider_key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderConfig)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// JSON object form, key order preserved.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, config) in &self.entries {
            // ProviderConfig holds only strings, numbers and bools.
            let value = serde_json::to_value(config).unwrap_or(Value::Null);
            map.insert(key.clone(), value);
        }
        Value::Object(map)
    }
}

impl Serialize for ProviderFragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, config) in &self.entries {
            map.serialize_entry(key, config)?;
        }
        map.end()
    }
}

/// Build the provider fragment for `credentials`.  Pure and deterministic:
/// the same input always yields the same output, byte for byte.
pub fn merge_credentials(credentials: &[ModelCredential]) -> ProviderFragment {
    let mut groups: Vec<(String, Vec<&ModelCredential>)> = Vec::new();
    for credential in credentials {
        let key = credential.provider_key();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(credential),
            None => groups.push((key, vec![credential])),
        }
    }

    let entries = groups
        .into_iter()
        .map(|(key, members)| {
            // Groups are created with their first member.
            let first = members[0];
            let profile = resolve_profile(&key, &first.base_url);
            let api_key = (!first.api_key.is_empty()).then(|| first.api_key.clone());
            let config = ProviderConfig {
                base_url: profile.base_url,
                api: profile.api,
                api_key,
                models: members.iter().map(|c| ProviderModel::from_credential(c)).collect(),
            };
            (key, config)
        })
        .collect();

    ProviderFragment { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{AgentModelsData, CredentialDraft};
    use serde_json::json;

    fn creds(drafts: &[CredentialDraft]) -> Vec<ModelCredential> {
        let mut data = AgentModelsData::default();
        for d in drafts {
            data.add(d).unwrap();
        }
        data.models
    }

    #[test]
    fn empty_set_yields_empty_fragment() {
        let fragment = merge_credentials(&[]);
        assert!(fragment.is_empty());
        assert_eq!(fragment.to_value(), json!({}));
    }

    #[test]
    fn providers_are_grouped_case_insensitively_in_order() {
        let c = creds(&[
            CredentialDraft::new("GPT-4", "OpenAI", "gpt-4"),
            CredentialDraft::new("GPT-4o", "openai", "gpt-4o"),
        ]);
        let fragment = merge_credentials(&c);
        assert_eq!(fragment.keys().collect::<Vec<_>>(), vec!["openai"]);
        let openai = fragment.get("openai").unwrap();
        let ids: Vec<&str> = openai.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-4", "gpt-4o"]);
    }

    #[test]
    fn first_seen_order_is_kept_across_providers() {
        let c = creds(&[
            CredentialDraft::new("a", "groq", "llama3"),
            CredentialDraft::new("b", "anthropic", "claude-3"),
            CredentialDraft::new("c", "GROQ", "mixtral"),
        ]);
        let fragment = merge_credentials(&c);
        assert_eq!(fragment.keys().collect::<Vec<_>>(), vec!["groq", "anthropic"]);
        let text = serde_json::to_string(&fragment).unwrap();
        assert!(text.find("\"groq\"").unwrap() < text.find("\"anthropic\"").unwrap());
    }

    #[test]
    fn group_settings_come_from_first_credential() {
        let c = creds(&[
            CredentialDraft::new("a", "openai", "gpt-4")
                .with_base_url("https://proxy.local/v1"),
            CredentialDraft::new("b", "openai", "gpt-4o")
                .with_api_key("sk-second")
                .with_base_url("https://ignored/v1"),
        ]);
        let openai = merge_credentials(&c).get("openai").cloned().unwrap();
        assert_eq!(openai.base_url, "https://proxy.local/v1");
        assert_eq!(openai.api, "openai-completions");
        // First credential has no key, so the group has none.
        assert_eq!(openai.api_key, None);
    }

    #[test]
    fn api_key_omitted_from_json_when_absent() {
        let c = creds(&[CredentialDraft::new("a", "ollama", "llama3")]);
        let value = merge_credentials(&c).to_value();
        assert!(value["ollama"].get("apiKey").is_none());
        assert_eq!(value["ollama"]["baseUrl"], "http://localhost:11434/v1");
    }

    #[test]
    fn unknown_provider_uses_fallback_profile() {
        let c = creds(&[CredentialDraft::new("x", "my-lab", "exp-1").with_api_key("k")]);
        let value = merge_credentials(&c).to_value();
        assert_eq!(
            value,
            json!({
                "my-lab": {
                    "baseUrl": "",
                    "api": "openai-completions",
                    "apiKey": "k",
                    "models": [{
                        "id": "exp-1",
                        "name": "x",
                        "reasoning": false,
                        "input": ["text"],
                        "contextWindow": 128000,
                        "maxTokens": 8192
                    }]
                }
            })
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let c = creds(&[
            CredentialDraft::new("a", "anthropic", "claude-3").with_api_key("k1"),
            CredentialDraft::new("b", "OpenAI", "gpt-4o"),
            CredentialDraft::new("c", "openai", "gpt-4"),
        ]);
        let first = serde_json::to_string(&merge_credentials(&c)).unwrap();
        let second = serde_json::to_string(&merge_credentials(&c)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn serialize_and_to_value_agree() {
        let c = creds(&[
            CredentialDraft::new("a", "deepseek", "deepseek-chat"),
            CredentialDraft::new("b", "zai", "glm-4"),
        ]);
        let fragment = merge_credentials(&c);
        assert_eq!(serde_json::to_value(&fragment).unwrap(), fragment.to_value());
    }
}
