// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, EditCredentialArgs, ModelsCommand, NewCredentialArgs};
use gatesync_config::Config;
use gatesync_core::channel::CONFIG_PATCH;
use gatesync_core::provider::list_providers;
use gatesync_core::{
    AgentModelsData, ConfigSyncer, CredentialDraft, CredentialStore, JsonFileStore,
    MemoryGateway, ModelCredential, SyncOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match &cli.command {
        Commands::Completions { shell } => {
            cli::print_completions(*shell);
            Ok(())
        }
        Commands::ShowConfig => {
            let config = gatesync_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Providers { json } => list_providers_cmd(*json),
        Commands::Models { action } => {
            let config = gatesync_config::load(cli.config.as_deref())?;
            let store = JsonFileStore::new(models_path(&cli, &config));
            models_cmd(&store, action)
        }
        Commands::Preview {
            document,
            merged,
            show_secrets,
        } => {
            let config = gatesync_config::load(cli.config.as_deref())?;
            let store = JsonFileStore::new(models_path(&cli, &config));
            preview_cmd(&store, &config, document, *merged, *show_secrets).await
        }
    }
}

fn models_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.models_file
        .clone()
        .unwrap_or_else(|| config.storage.models_path())
}

// ── models ────────────────────────────────────────────────────────────────────

fn models_cmd(store: &JsonFileStore, action: &ModelsCommand) -> anyhow::Result<()> {
    let mut data = store.load()?;
    if data.repair_selection() {
        tracing::warn!("active model pointed at a missing credential; selection repaired");
    }

    match action {
        ModelsCommand::List { json } => {
            print_models(&data, *json)?;
            return Ok(());
        }
        ModelsCommand::Add(args) => {
            let c = data.add(&new_draft(args))?;
            println!("Added {} ({})", c.id, c.primary_ref());
        }
        ModelsCommand::Edit { id, fields } => {
            let current = data
                .get(id)
                .with_context(|| format!("no credential with id {id}"))?;
            let draft = edit_draft(current, fields);
            let c = data.update(id, &draft)?;
            println!("Updated {} ({})", c.id, c.primary_ref());
        }
        ModelsCommand::Remove { id } => {
            let removed = data
                .remove(id)
                .with_context(|| format!("no credential with id {id}"))?;
            println!("Removed {} ({})", removed.id, removed.name);
            match data.active() {
                Some(active) => println!("Active model: {}", active.primary_ref()),
                None => println!("No active model."),
            }
        }
        ModelsCommand::Activate { id } => {
            data.set_active(Some(id))?;
            if let Some(active) = data.active() {
                println!("Active model: {}", active.primary_ref());
            }
        }
        ModelsCommand::Deactivate => {
            data.set_active(None)?;
            println!("No active model.");
        }
    }

    store.save(&data)?;
    tracing::debug!(path = %store.path().display(), "credential file written");
    Ok(())
}

fn new_draft(args: &NewCredentialArgs) -> CredentialDraft {
    CredentialDraft {
        name: args.name.clone(),
        provider: args.provider.clone(),
        model_id: args.model_id.clone(),
        api_key: args.api_key.clone().unwrap_or_default(),
        base_url: args.base_url.clone().unwrap_or_default(),
    }
}

fn edit_draft(current: &ModelCredential, fields: &EditCredentialArgs) -> CredentialDraft {
    let pick = |new: &Option<String>, old: &str| new.clone().unwrap_or_else(|| old.to_string());
    CredentialDraft {
        name: pick(&fields.name, &current.name),
        provider: pick(&fields.provider, &current.provider),
        model_id: pick(&fields.model_id, &current.model_id),
        api_key: pick(&fields.api_key, &current.api_key),
        base_url: pick(&fields.base_url, &current.base_url),
    }
}

/// `sk-proj-abc…` → `sk-p****`.  Short keys are hidden entirely.
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    if key.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = key.chars().take(4).collect();
    format!("{head}****")
}

fn print_models(data: &AgentModelsData, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let mut value = serde_json::to_value(data)?;
        if let Some(models) = value.get_mut("models").and_then(Value::as_array_mut) {
            for m in models {
                if let Some(key) = m.get_mut("apiKey") {
                    let masked = mask_key(key.as_str().unwrap_or_default());
                    *key = Value::String(masked);
                }
            }
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if data.is_empty() {
        println!("No credentials stored.");
        return Ok(());
    }

    let id_w = data.models.iter().map(|m| m.id.len()).max().unwrap_or(2).max(2);
    let name_w = data.models.iter().map(|m| m.name.len()).max().unwrap_or(4).max(4);
    let ref_w = data
        .models
        .iter()
        .map(|m| m.primary_ref().len())
        .max()
        .unwrap_or(5)
        .max(5);

    println!(
        "   {:<id_w$}  {:<name_w$}  {:<ref_w$}  {:<8}  BASE URL",
        "ID", "NAME", "MODEL", "API KEY",
    );
    println!("{}", "-".repeat(id_w + name_w + ref_w + 30));
    for m in &data.models {
        let marker = if data.active_model_id.as_deref() == Some(m.id.as_str()) {
            "*"
        } else {
            " "
        };
        let key = if m.api_key.is_empty() {
            "-".to_string()
        } else {
            mask_key(&m.api_key)
        };
        let url = if m.base_url.is_empty() {
            "(default)"
        } else {
            m.base_url.as_str()
        };
        println!(
            " {marker} {:<id_w$}  {:<name_w$}  {:<ref_w$}  {:<8}  {url}",
            m.id,
            m.name,
            m.primary_ref(),
            key,
        );
    }
    println!("\nTotal: {} credential(s); * = active", data.models.len());
    Ok(())
}

// ── providers ─────────────────────────────────────────────────────────────────

fn list_providers_cmd(as_json: bool) -> anyhow::Result<()> {
    let providers = list_providers();

    if as_json {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ProviderJson {
            id: &'static str,
            base_url: &'static str,
            api: &'static str,
        }
        let rows: Vec<ProviderJson> = providers
            .iter()
            .map(|p| ProviderJson {
                id: p.id,
                base_url: p.default_base_url,
                api: p.api,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let id_w = providers.iter().map(|p| p.id.len()).max().unwrap_or(8).max(8);
    let api_w = providers.iter().map(|p| p.api.len()).max().unwrap_or(3).max(3);
    println!("{:<id_w$}  {:<api_w$}  DEFAULT BASE URL", "PROVIDER", "API");
    println!("{}", "-".repeat(id_w + api_w + 40));
    for p in providers {
        let url = if p.default_base_url.is_empty() {
            "(must be set per credential)"
        } else {
            p.default_base_url
        };
        println!("{:<id_w$}  {:<api_w$}  {url}", p.id, p.api);
    }
    println!("\nUnlisted providers use the openai-completions API and need --base-url.");
    Ok(())
}

// ── preview ───────────────────────────────────────────────────────────────────

/// Run a real sync against an in-process gateway holding a copy of the
/// document, then show what was submitted.
async fn preview_cmd(
    store: &JsonFileStore,
    config: &Config,
    document: &Path,
    show_merged: bool,
    show_secrets: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(document)
        .with_context(|| format!("reading gateway document {}", document.display()))?;
    let data = store.load()?;

    let gateway = Arc::new(MemoryGateway::new());
    gateway.set_raw(raw);
    let syncer = ConfigSyncer::new(gateway.clone(), SyncOptions::from(&config.sync));
    let report = syncer
        .sync(&data)
        .await
        .with_context(|| format!("building patch against {}", document.display()))?;

    let submitted = gateway
        .calls()
        .into_iter()
        .rev()
        .find(|c| c.method == CONFIG_PATCH)
        .context("no config.patch was submitted")?;
    let mut params = submitted.params;
    // Show the patch document itself rather than its escaped string form.
    if let Some(raw) = params.get("raw").and_then(Value::as_str) {
        let parsed: Value = serde_json::from_str(raw).context("parsing submitted patch")?;
        params["raw"] = parsed;
    }
    if !show_secrets {
        redact_api_keys(&mut params);
    }

    println!("config.patch params:");
    println!("{}", serde_json::to_string_pretty(&params)?);
    println!(
        "\nProviders: {}",
        if report.providers.is_empty() {
            "(none)".to_string()
        } else {
            report.providers.join(", ")
        }
    );
    println!("Primary:   {}", report.primary.as_deref().unwrap_or("(unchanged)"));

    if show_merged {
        let mut merged = gateway
            .document()
            .context("patched document is not valid JSON")?;
        if !show_secrets {
            redact_api_keys(&mut merged);
        }
        println!("\nDocument after patch:");
        println!("{}", serde_json::to_string_pretty(&merged)?);
    }
    Ok(())
}

/// Mask every string-valued `apiKey` field, at any depth.
fn redact_api_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                match v {
                    Value::String(s) if k == "apiKey" => *s = mask_key(s),
                    other => redact_api_keys(other),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_api_keys),
        _ => {}
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mask_key_keeps_short_prefix() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abc"), "****");
        assert_eq!(mask_key("sk-proj-1234567890"), "sk-p****");
    }

    #[test]
    fn redact_reaches_nested_provider_keys() {
        let mut v = json!({
            "raw": {"models": {"providers": {"openai": {"apiKey": "sk-secret-value"}}}},
            "list": [{"apiKey": "another-secret"}],
            "note": "apiKey"
        });
        redact_api_keys(&mut v);
        assert_eq!(v["raw"]["models"]["providers"]["openai"]["apiKey"], "sk-s****");
        assert_eq!(v["list"][0]["apiKey"], "anot****");
        assert_eq!(v["note"], "apiKey");
    }

    #[test]
    fn edit_draft_keeps_unset_fields() {
        let mut data = AgentModelsData::default();
        let c = data
            .add(&CredentialDraft::new("Main", "openai", "gpt-4").with_api_key("sk-1"))
            .unwrap()
            .clone();
        let fields = EditCredentialArgs {
            name: None,
            provider: None,
            model_id: Some("gpt-4o".into()),
            api_key: Some(String::new()),
            base_url: None,
        };
        let d = edit_draft(&c, &fields);
        assert_eq!(d.name, "Main");
        assert_eq!(d.model_id, "gpt-4o");
        assert_eq!(d.api_key, "");
    }
}
