// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Failure of a single request/response round trip on the gateway channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("not connected to gateway")]
    NotConnected,

    /// The gateway answered with an error frame.
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway answered, but not with the shape the method promises.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl ChannelError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        ChannelError::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Failure of one config sync attempt.  The `Display` text is what the
/// syncer records as its user-facing `last_error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("not connected to gateway")]
    NotConnected,

    #[error("a config sync is already in progress")]
    InProgress,

    #[error("gateway has no configuration document")]
    NoRemoteConfig,

    #[error("remote configuration is malformed: {0}")]
    MalformedRemoteDocument(String),

    /// The gateway refused the patch, normally because the document changed
    /// after it was fetched.  Running the sync again re-fetches a fresh hash.
    #[error("configuration changed on the gateway, sync again to retry: {0}")]
    Conflict(String),

    #[error("sync failed: {0}")]
    Transport(ChannelError),
}

impl From<PatchError> for SyncError {
    fn from(e: PatchError) -> Self {
        match e {
            PatchError::MalformedRemoteDocument(msg) => SyncError::MalformedRemoteDocument(msg),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("remote configuration is malformed: {0}")]
    MalformedRemoteDocument(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("{0}")]
    Submit(ChannelError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential field `{0}` must not be empty")]
    MissingField(&'static str),

    #[error("no credential with id {0}")]
    UnknownCredential(String),
}
