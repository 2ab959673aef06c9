// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Provider profile table: the default base URL and wire API the gateway
//! should use for each known model provider.
//!
//! The table is read-only.  Credentials reference providers by free-form
//! name; [`ProviderKind::parse`] normalizes that name and anything unlisted
//! maps to [`ProviderKind::Unknown`].

use serde::Serialize;

/// API type used when a provider is not in the table.
pub const DEFAULT_API: &str = "openai-completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    DeepSeek,
    Moonshot,
    Zhipu,
    Zai,
    Qwen,
    MiniMax,
    Groq,
    Xai,
    Mistral,
    Cerebras,
    OpenRouter,
    Ollama,
    Azure,
    Baidu,
    Custom,
    /// Any provider name not listed above.
    Unknown,
}

/// Static defaults for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderMeta {
    pub kind: ProviderKind,
    /// Normalized provider key, as used in `models.providers`.
    pub id: &'static str,
    /// Empty when the operator must supply a URL (Azure, custom).
    pub default_base_url: &'static str,
    pub api: &'static str,
}

/// Complete provider table.
pub static PROVIDERS: &[ProviderMeta] = &[
    ProviderMeta {
        kind: ProviderKind::OpenAi,
        id: "openai",
        default_base_url: "https://api.openai.com/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Anthropic,
        id: "anthropic",
        default_base_url: "https://api.anthropic.com",
        api: "anthropic-messages",
    },
    ProviderMeta {
        kind: ProviderKind::Google,
        id: "google",
        default_base_url: "https://generativelanguage.googleapis.com/v1beta",
        api: "google-gemini",
    },
    ProviderMeta {
        kind: ProviderKind::DeepSeek,
        id: "deepseek",
        default_base_url: "https://api.deepseek.com/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Moonshot,
        id: "moonshot",
        default_base_url: "https://api.moonshot.cn/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Zhipu,
        id: "zhipu",
        default_base_url: "https://open.bigmodel.cn/api/paas/v4",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Zai,
        id: "zai",
        default_base_url: "https://open.bigmodel.cn/api/paas/v4",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Qwen,
        id: "qwen",
        default_base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::MiniMax,
        id: "minimax",
        default_base_url: "https://api.minimax.chat/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Groq,
        id: "groq",
        default_base_url: "https://api.groq.com/openai/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Xai,
        id: "xai",
        default_base_url: "https://api.x.ai/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Mistral,
        id: "mistral",
        default_base_url: "https://api.mistral.ai/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Cerebras,
        id: "cerebras",
        default_base_url: "https://api.cerebras.ai/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::OpenRouter,
        id: "openrouter",
        default_base_url: "https://openrouter.ai/api/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Ollama,
        id: "ollama",
        default_base_url: "http://localhost:11434/v1",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Azure,
        id: "azure",
        default_base_url: "",
        api: "azure-openai",
    },
    ProviderMeta {
        kind: ProviderKind::Baidu,
        id: "baidu",
        default_base_url: "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop",
        api: "openai-completions",
    },
    ProviderMeta {
        kind: ProviderKind::Custom,
        id: "custom",
        default_base_url: "",
        api: "openai-completions",
    },
];

/// Normalized grouping key for a provider name: trimmed and lowercased.
pub fn normalize_provider(provider: &str) -> String {
    provider.trim().to_lowercase()
}

impl ProviderKind {
    pub fn parse(provider: &str) -> Self {
        let key = normalize_provider(provider);
        PROVIDERS
            .iter()
            .find(|p| p.id == key)
            .map(|p| p.kind)
            .unwrap_or(ProviderKind::Unknown)
    }

    /// Table entry for this kind; `None` for [`ProviderKind::Unknown`].
    pub fn meta(self) -> Option<&'static ProviderMeta> {
        PROVIDERS.iter().find(|p| p.kind == self)
    }
}

/// Effective `{baseUrl, api}` for a provider group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub base_url: String,
    pub api: String,
}

/// Resolve the profile for `provider`, letting a non-blank `custom_base_url`
/// override the table URL.  The API type always comes from the table.
pub fn resolve_profile(provider: &str, custom_base_url: &str) -> ProviderProfile {
    let (default_url, api) = match ProviderKind::parse(provider).meta() {
        Some(meta) => (meta.default_base_url, meta.api),
        None => ("", DEFAULT_API),
    };
    let custom = custom_base_url.trim();
    ProviderProfile {
        base_url: if custom.is_empty() { default_url } else { custom }.to_string(),
        api: api.to_string(),
    }
}

/// Returns all known providers in declaration order.
pub fn list_providers() -> &'static [ProviderMeta] {
    PROVIDERS
}
