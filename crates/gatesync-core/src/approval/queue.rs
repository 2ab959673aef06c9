// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::channel::GatewayChannel;
use crate::error::ApprovalError;

/// One kind of gateway approval request.
pub trait ApprovalRequest: Clone + fmt::Debug + Send + Sync + 'static {
    /// The operator's possible answers.  Serializes to the wire string.
    type Decision: Copy + fmt::Debug + Serialize + Send + Sync;

    /// RPC method that submits a decision.
    const RESOLVE_METHOD: &'static str;

    /// Prefix of user-facing failure messages.
    const LABEL: &'static str;

    fn id(&self) -> &str;

    /// Epoch milliseconds after which the gateway no longer waits for an
    /// answer.
    fn expires_at_ms(&self) -> Option<i64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    NotConnected,
    /// A decision for the head is already in flight.
    Busy,
}

/// Result of one [`ApprovalQueue::decide`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Resolved { id: String },
    /// Submission failed; the request is still queued.
    Failed { id: String, message: String },
    /// Nothing was submitted.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalQueueState<T> {
    pub pending: Vec<T>,
    pub busy: bool,
    pub last_error: Option<String>,
}

struct QueueInner<T> {
    pending: Vec<T>,
    /// Id of the head whose decision is on the wire.
    in_flight: Option<String>,
    last_error: Option<String>,
}

/// FIFO of pending approval requests for one domain.
///
/// Decisions only ever target the head and at most one is in flight.  The
/// lock is never held across the network round trip, so inbound events can
/// keep mutating the queue while a decision is pending.
pub struct ApprovalQueue<T: ApprovalRequest> {
    channel: Arc<dyn GatewayChannel>,
    inner: Mutex<QueueInner<T>>,
}

impl<T: ApprovalRequest> ApprovalQueue<T> {
    pub fn new(channel: Arc<dyn GatewayChannel>) -> Self {
        Self {
            channel,
            inner: Mutex::new(QueueInner {
                pending: Vec::new(),
                in_flight: None,
                last_error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `request` unless one with the same id is already queued.
    pub fn enqueue(&self, request: T) -> bool {
        let mut inner = self.lock();
        if inner.pending.iter().any(|e| e.id() == request.id()) {
            debug!(label = T::LABEL, id = request.id(), "duplicate approval request dropped");
            return false;
        }
        info!(label = T::LABEL, id = request.id(), "approval request queued");
        inner.pending.push(request);
        true
    }

    /// Drop the request `id`, e.g. because it was resolved elsewhere or
    /// withdrawn by the gateway.
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let before = inner.pending.len();
        inner.pending.retain(|e| e.id() != id);
        let removed = inner.pending.len() != before;
        if removed {
            debug!(label = T::LABEL, id, "approval request withdrawn");
        }
        removed
    }

    /// Drop every request whose expiry is at or before `now_ms`.  The request
    /// currently being decided is kept.
    pub fn prune_expired(&self, now_ms: i64) -> usize {
        let mut inner = self.lock();
        let in_flight = inner.in_flight.clone();
        let before = inner.pending.len();
        inner.pending.retain(|e| {
            in_flight.as_deref() == Some(e.id())
                || !e.expires_at_ms().is_some_and(|at| at <= now_ms)
        });
        let pruned = before - inner.pending.len();
        if pruned > 0 {
            debug!(label = T::LABEL, pruned, "expired approval requests dropped");
        }
        pruned
    }

    /// The request the operator is currently asked about.
    pub fn active(&self) -> Option<T> {
        self.lock().pending.first().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn snapshot(&self) -> ApprovalQueueState<T> {
        let inner = self.lock();
        ApprovalQueueState {
            pending: inner.pending.clone(),
            busy: inner.in_flight.is_some(),
            last_error: inner.last_error.clone(),
        }
    }

    /// Submit `decision` for the head request.
    ///
    /// Does nothing when the queue is empty, the channel is down, or a
    /// decision is already in flight.  On success the decided request is
    /// removed by id; on failure it stays at the head and the error is kept
    /// for display, unless the request was withdrawn in the meantime.
    pub async fn decide(&self, decision: T::Decision) -> DecisionOutcome {
        let id = {
            let mut inner = self.lock();
            let Some(head) = inner.pending.first() else {
                return DecisionOutcome::Skipped(SkipReason::Empty);
            };
            let id = head.id().to_string();
            if !self.channel.is_connected() {
                return DecisionOutcome::Skipped(SkipReason::NotConnected);
            }
            if inner.in_flight.is_some() {
                return DecisionOutcome::Skipped(SkipReason::Busy);
            }
            inner.in_flight = Some(id.clone());
            inner.last_error = None;
            id
        };

        info!(label = T::LABEL, %id, ?decision, "submitting approval decision");
        let result = self
            .channel
            .request(T::RESOLVE_METHOD, json!({ "id": id, "decision": decision }))
            .await
            .map_err(ApprovalError::Submit);

        let mut inner = self.lock();
        inner.in_flight = None;
        match result {
            Ok(_) => {
                inner.pending.retain(|e| e.id() != id);
                DecisionOutcome::Resolved { id }
            }
            Err(e) => {
                let message = format!("{} failed: {e}", T::LABEL);
                warn!(%id, "{message}");
                if inner.pending.iter().any(|r| r.id() == id) {
                    inner.last_error = Some(message.clone());
                }
                DecisionOutcome::Failed { id, message }
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
