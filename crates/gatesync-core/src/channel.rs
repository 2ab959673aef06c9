// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The one I/O boundary of this crate: request/response RPC to the gateway
//! plus the push events it emits.
//!
//! ```text
//! Control panel                          Gateway
//!    │── config.get {} ────────────────►│
//!    │◄─ {raw, hash, exists} ───────────│
//!    │── config.patch {raw, baseHash} ─►│  baseHash ≠ current → rejected
//!    │◄─ ok ────────────────────────────│  restart scheduled
//!    │                                  │
//!    │◄─ event exec.approval.requested ─│
//!    │── exec.approval.resolve {id} ───►│
//!    │◄─ event exec.approval.resolved ──│
//! ```
//!
//! Connection setup, authentication and reconnection belong to whoever
//! implements [`GatewayChannel`]; the coordination logic only needs
//! `is_connected` and `request`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelError;

// ── RPC method names ──────────────────────────────────────────────────────────

pub const CONFIG_GET: &str = "config.get";
pub const CONFIG_PATCH: &str = "config.patch";
pub const EXEC_APPROVAL_RESOLVE: &str = "exec.approval.resolve";
pub const CONTENT_AUDIT_RESOLVE: &str = "contentAudit.resolve";

// ── Push event names ──────────────────────────────────────────────────────────

pub const EXEC_APPROVAL_REQUESTED: &str = "exec.approval.requested";
pub const EXEC_APPROVAL_RESOLVED: &str = "exec.approval.resolved";
pub const CONTENT_AUDIT_REQUESTED: &str = "contentAudit.requested";
pub const CONTENT_AUDIT_RESOLVED: &str = "contentAudit.resolved";

/// Request/response access to the gateway.
///
/// Implementations must be cheap to share: the syncer and both approval
/// queues hold the same `Arc<dyn GatewayChannel>`.  No timeout is applied
/// on this side; a request that never resolves keeps the caller's busy flag
/// set until the channel gives up.
#[async_trait]
pub trait GatewayChannel: Send + Sync {
    /// Whether a live connection currently exists.  Callers skip the network
    /// entirely when this is `false`.
    fn is_connected(&self) -> bool;

    /// Send one request and wait for its response payload.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChannelError>;
}

/// Send a request and decode the response payload into `T`.
pub async fn request_typed<T: DeserializeOwned>(
    channel: &dyn GatewayChannel,
    method: &str,
    params: Value,
) -> Result<T, ChannelError> {
    let payload = channel.request(method, params).await?;
    serde_json::from_value(payload).map_err(|e| ChannelError::Protocol(format!("{method}: {e}")))
}

/// An asynchronous notification pushed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl GatewayEvent {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Value);

    #[async_trait]
    impl GatewayChannel for Fixed {
        fn is_connected(&self) -> bool {
            true
        }
        async fn request(&self, _method: &str, _params: Value) -> Result<Value, ChannelError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug, Deserialize)]
    struct Ack {
        ok: bool,
    }

    #[tokio::test]
    async fn request_typed_decodes_payload() {
        let ch = Fixed(json!({"ok": true}));
        let ack: Ack = request_typed(&ch, "ping", json!({})).await.unwrap();
        assert!(ack.ok);
    }

    #[tokio::test]
    async fn request_typed_reports_shape_mismatch_as_protocol_error() {
        let ch = Fixed(json!(["not", "an", "object"]));
        let err = request_typed::<Ack>(&ch, "ping", json!({})).await.unwrap_err();
        assert!(matches!(err, ChannelError::Protocol(ref m) if m.starts_with("ping:")));
    }

    #[test]
    fn gateway_event_payload_defaults_to_null() {
        let ev: GatewayEvent = serde_json::from_str(r#"{"event":"tick"}"#).unwrap();
        assert_eq!(ev.event, "tick");
        assert!(ev.payload.is_null());
    }
}
