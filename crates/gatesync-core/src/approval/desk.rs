// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    ApprovalQueue, ApprovalRequest, ContentAuditApprovalRequest, ExecApprovalRequest,
};
use crate::channel::{
    GatewayChannel, GatewayEvent, CONTENT_AUDIT_REQUESTED, CONTENT_AUDIT_RESOLVED,
    EXEC_APPROVAL_REQUESTED, EXEC_APPROVAL_RESOLVED,
};

/// Both approval queues over one shared channel.
///
/// The two queues are independent: a decision in flight on one never blocks
/// the other.
pub struct ApprovalDesk {
    pub exec: ApprovalQueue<ExecApprovalRequest>,
    pub content_audit: ApprovalQueue<ContentAuditApprovalRequest>,
}

#[derive(Deserialize)]
struct ResolvedPayload {
    id: String,
}

impl ApprovalDesk {
    pub fn new(channel: Arc<dyn GatewayChannel>) -> Self {
        Self {
            exec: ApprovalQueue::new(channel.clone()),
            content_audit: ApprovalQueue::new(channel),
        }
    }

    /// Route an inbound gateway event.  Returns `false` for events that are
    /// not about approvals.
    pub fn handle_event(&self, event: &GatewayEvent) -> bool {
        match event.event.as_str() {
            EXEC_APPROVAL_REQUESTED => enqueue_from(&self.exec, event),
            CONTENT_AUDIT_REQUESTED => enqueue_from(&self.content_audit, event),
            EXEC_APPROVAL_RESOLVED => remove_from(&self.exec, event),
            CONTENT_AUDIT_RESOLVED => remove_from(&self.content_audit, event),
            _ => return false,
        }
        true
    }

    /// Prune expired requests from both queues.
    pub fn prune_expired(&self, now_ms: i64) -> usize {
        self.exec.prune_expired(now_ms) + self.content_audit.prune_expired(now_ms)
    }
}

fn enqueue_from<T>(queue: &ApprovalQueue<T>, event: &GatewayEvent)
where
    T: ApprovalRequest + for<'de> Deserialize<'de>,
{
    match serde_json::from_value::<T>(event.payload.clone()) {
        Ok(request) => {
            queue.enqueue(request);
        }
        Err(e) => warn!(event = %event.event, "ignoring malformed approval request: {e}"),
    }
}

fn remove_from<T: ApprovalRequest>(queue: &ApprovalQueue<T>, event: &GatewayEvent) {
    match serde_json::from_value::<ResolvedPayload>(event.payload.clone()) {
        Ok(resolved) => {
            if !queue.remove(&resolved.id) {
                debug!(event = %event.event, id = %resolved.id, "resolved request was not queued");
            }
        }
        Err(e) => warn!(event = %event.event, "ignoring malformed resolution event: {e}"),
    }
}
