// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Client-side coordination layer for an agent gateway.
//!
//! Two concerns live here:
//!
//! - **Config sync**: locally edited model credentials are collapsed into a
//!   provider-keyed fragment ([`merge`]), turned into a scoped patch against
//!   the freshly fetched remote document ([`patch`]) and submitted under the
//!   document's hash ([`sync`]).
//! - **Approval queues**: operator decisions on gateway approval requests are
//!   serialized per domain, head first, one submission at a time
//!   ([`approval`]).
//!
//! All I/O goes through a single [`GatewayChannel`].

pub mod approval;
pub mod channel;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod merge;
pub mod models;
pub mod patch;
pub mod provider;
pub mod store;
pub mod sync;

pub use approval::{
    ApprovalDesk, ApprovalQueue, ApprovalQueueState, ApprovalRequest, ContentAuditApprovalRequest,
    ContentAuditDecision, DecisionOutcome, ExecApprovalRequest, ExecDecision, SkipReason,
};
pub use channel::{GatewayChannel, GatewayEvent};
pub use credentials::{AgentModelsData, CredentialDraft, ModelCredential};
pub use error::{ApprovalError, ChannelError, CredentialError, PatchError, SyncError};
pub use memory::MemoryGateway;
pub use merge::{merge_credentials, ProviderConfig, ProviderFragment, ProviderModel};
pub use models::{EditTarget, ModelChange, ModelManager};
pub use patch::{merge_patch, ConfigPatch, ConfigPatchBuilder, RemoteConfigSnapshot};
pub use provider::{resolve_profile, ProviderKind, ProviderProfile};
pub use store::{CredentialStore, JsonFileStore, MemoryStore};
pub use sync::{ConfigSyncer, SyncOptions, SyncReport, SyncState};
