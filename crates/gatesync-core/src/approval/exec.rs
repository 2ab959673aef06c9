// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use super::ApprovalRequest;
use crate::channel::EXEC_APPROVAL_RESOLVE;

/// The command an agent wants to run on a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

/// Payload of `exec.approval.requested`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecApprovalRequest {
    pub id: String,
    pub request: ExecCommand,
    #[serde(default)]
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

impl ExecApprovalRequest {
    pub fn new(id: impl Into<String>, command: impl Into<String>, expires_at_ms: i64) -> Self {
        Self {
            id: id.into(),
            request: ExecCommand {
                command: command.into(),
                ..ExecCommand::default()
            },
            created_at_ms: 0,
            expires_at_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecDecision {
    AllowOnce,
    AllowAlways,
    Deny,
}

impl ApprovalRequest for ExecApprovalRequest {
    type Decision = ExecDecision;
    const RESOLVE_METHOD: &'static str = EXEC_APPROVAL_RESOLVE;
    const LABEL: &'static str = "Exec approval";

    fn id(&self) -> &str {
        &self.id
    }

    fn expires_at_ms(&self) -> Option<i64> {
        Some(self.expires_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decisions_use_wire_names() {
        assert_eq!(json!(ExecDecision::AllowOnce), json!("allow-once"));
        assert_eq!(json!(ExecDecision::AllowAlways), json!("allow-always"));
        assert_eq!(json!(ExecDecision::Deny), json!("deny"));
    }

    #[test]
    fn parses_gateway_payload() {
        let r: ExecApprovalRequest = serde_json::from_value(json!({
            "id": "a1",
            "request": {
                "command": "rm -rf build",
                "cwd": "/work",
                "agentId": "main",
                "resolvedPath": "/usr/bin/rm",
                "sessionKey": "agent:main:main"
            },
            "createdAtMs": 10,
            "expiresAtMs": 120010
        }))
        .unwrap();
        assert_eq!(r.request.command, "rm -rf build");
        assert_eq!(r.request.agent_id.as_deref(), Some("main"));
        assert_eq!(r.request.host, None);
        assert_eq!(r.expires_at_ms(), Some(120010));
    }

    #[test]
    fn missing_expiry_is_rejected() {
        let r = serde_json::from_value::<ExecApprovalRequest>(json!({
            "id": "a1",
            "request": {"command": "ls"}
        }));
        assert!(r.is_err());
    }
}
