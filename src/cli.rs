// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gatesync",
    about = "Manage model credentials and preview gateway config patches",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (merged on top of auto-discovered files)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Credential file to use instead of the configured one
    #[arg(long, global = true, env = "GATESYNC_MODELS_FILE", value_name = "PATH")]
    pub models_file: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Edit the locally stored model credentials
    Models {
        #[command(subcommand)]
        action: ModelsCommand,
    },
    /// List known model providers with their default base URL and API type
    Providers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the config patch a sync would submit against a copy of the
    /// gateway's configuration document.
    ///
    /// The document is read from a local JSON file (e.g. a saved
    /// `config.get` raw value).  Nothing is sent anywhere.
    Preview {
        /// Local copy of the gateway configuration document
        #[arg(long, short = 'd', value_name = "PATH")]
        document: PathBuf,
        /// Also print the document as it looks after the patch is applied
        #[arg(long)]
        merged: bool,
        /// Print API keys in clear text
        #[arg(long)]
        show_secrets: bool,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// List stored credentials (API keys are masked)
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a credential; it becomes active if none is
    Add(NewCredentialArgs),
    /// Change fields of an existing credential
    Edit {
        /// Credential id
        id: String,
        #[command(flatten)]
        fields: EditCredentialArgs,
    },
    /// Delete a credential
    Remove {
        /// Credential id
        id: String,
    },
    /// Make a credential the agents' primary model
    Activate {
        /// Credential id
        id: String,
    },
    /// Clear the active selection
    Deactivate,
}

#[derive(Args, Debug)]
pub struct NewCredentialArgs {
    /// Display name
    #[arg(long)]
    pub name: String,
    /// Provider, e.g. "openai", "anthropic", "ollama"
    #[arg(long, short = 'p')]
    pub provider: String,
    /// Model id as the provider knows it, e.g. "gpt-4o"
    #[arg(long, short = 'm')]
    pub model_id: String,
    #[arg(long, env = "GATESYNC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Overrides the provider's default base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Every field is optional; omitted fields keep their current value.
#[derive(Args, Debug)]
pub struct EditCredentialArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, short = 'p')]
    pub provider: Option<String>,
    #[arg(long, short = 'm')]
    pub model_id: Option<String>,
    /// New API key; pass an empty string to remove it
    #[arg(long)]
    pub api_key: Option<String>,
    /// New base URL; pass an empty string to use the provider default
    #[arg(long)]
    pub base_url: Option<String>,
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "gatesync", &mut std::io::stdout());
}
