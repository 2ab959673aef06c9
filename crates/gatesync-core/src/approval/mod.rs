// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Operator approval queues.
//!
//! The gateway pushes approval requests; the operator answers them one at a
//! time, oldest first.  Each domain has its own queue:
//!
//! | Domain | Request | Decisions |
//! |---|---|---|
//! | exec | [`ExecApprovalRequest`] | `allow-once`, `allow-always`, `deny` |
//! | content audit | [`ContentAuditApprovalRequest`] | `allow`, `block` |

mod content_audit;
mod desk;
mod exec;
mod queue;

pub use content_audit::{ContentAuditApprovalRequest, ContentAuditDecision};
pub use desk::ApprovalDesk;
pub use exec::{ExecApprovalRequest, ExecCommand, ExecDecision};
pub use queue::{ApprovalQueue, ApprovalQueueState, ApprovalRequest, DecisionOutcome, SkipReason};
