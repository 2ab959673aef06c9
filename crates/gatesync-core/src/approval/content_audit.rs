// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use super::ApprovalRequest;
use crate::channel::CONTENT_AUDIT_RESOLVE;

/// Payload of `contentAudit.requested`: a message held back by the content
/// audit until an operator lets it through or blocks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAuditApprovalRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
}

impl ContentAuditApprovalRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: None,
            excerpt: None,
            session_key: None,
            created_at_ms: 0,
            expires_at_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentAuditDecision {
    Allow,
    Block,
}

impl ApprovalRequest for ContentAuditApprovalRequest {
    type Decision = ContentAuditDecision;
    const RESOLVE_METHOD: &'static str = CONTENT_AUDIT_RESOLVE;
    const LABEL: &'static str = "Content audit approval";

    fn id(&self) -> &str {
        &self.id
    }

    fn expires_at_ms(&self) -> Option<i64> {
        self.expires_at_ms
    }
}
