// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One completion request, from admission to reply.
//!
//! ```text
//! Received ─► Admitted ─► Dispatched ─► Succeeded ─┐
//!    │                               └► Failed ────┴► Settled
//!    └► Denied
//! ```
//!
//! The account lock taken at admission is held across the provider call and
//! released by the commit (or the release, when nothing is charged). A
//! worker slot is taken only after admission, and only for admitted jobs.
//!
//! An expired drain (`Shared::abort`) cuts a job short wherever it waits:
//! before dispatch the user gets the busy reply and nothing is charged; a
//! running provider call counts as failed and settles like any failure.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use tollgate_core::{ChargeKind, InboundMessage, TollgateError, UsageOutcome, UserId};
use tollgate_ledger::Decision;
use tollgate_storage::UsageRecord;
use tollgate_storage::queries::usage;

use crate::dispatcher::Shared;
use crate::messages::{self, USAGE_TEXT_LIMIT, approx_tokens, truncate_chars};

/// Lifecycle of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Admitted,
    Denied,
    Dispatched,
    Succeeded,
    Failed,
    Settled,
    /// Cut short by an expired drain before reaching the provider.
    Interrupted,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Received => write!(f, "received"),
            JobState::Admitted => write!(f, "admitted"),
            JobState::Denied => write!(f, "denied"),
            JobState::Dispatched => write!(f, "dispatched"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed => write!(f, "failed"),
            JobState::Settled => write!(f, "settled"),
            JobState::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// A queued chat message.
pub(crate) struct Job {
    pub message: InboundMessage,
    pub received_at: Instant,
}

impl Job {
    pub fn new(message: InboundMessage) -> Self {
        Self {
            message,
            received_at: Instant::now(),
        }
    }
}

struct Progress<'a> {
    user_id: &'a UserId,
    state: JobState,
}

impl<'a> Progress<'a> {
    fn new(user_id: &'a UserId) -> Self {
        Self {
            user_id,
            state: JobState::Received,
        }
    }

    fn advance(&mut self, next: JobState) -> JobState {
        debug!(user_id = %self.user_id, from = %self.state, to = %next, "job state");
        self.state = next;
        next
    }
}

/// Runs a job to completion and returns its final state (`Denied`,
/// `Settled`, `Interrupted`, or `Failed` when admission itself broke).
pub(crate) async fn run(shared: &Shared, job: Job) -> JobState {
    let msg = job.message;
    let user_id = &msg.user_id;
    let mut progress = Progress::new(user_id);
    let settings = &shared.settings;

    let admitted = tokio::select! {
        biased;
        _ = shared.abort.cancelled() => None,
        admitted = shared.ledger.admit(user_id, &msg.display_name) => Some(admitted),
    };
    let Some(admitted) = admitted else {
        return interrupt(shared, user_id, &mut progress).await;
    };
    let ticket = match admitted {
        Ok(ticket) => ticket,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "admission failed");
            shared.deliver(user_id, &settings.fallback_reply).await;
            return progress.advance(JobState::Failed);
        }
    };

    let kind = match ticket.decision() {
        Decision::Admitted(kind) => *kind,
        Decision::Rejected(rejection) => {
            let notice = messages::rejection(rejection);
            info!(user_id = %user_id, reason = ?rejection.reason, "request denied");
            ticket.release();
            shared.deliver(user_id, &notice).await;
            return progress.advance(JobState::Denied);
        }
    };
    progress.advance(JobState::Admitted);

    shared.deliver(user_id, messages::PROCESSING).await;

    let worker = tokio::select! {
        biased;
        _ = shared.abort.cancelled() => None,
        permit = shared.workers.acquire() => permit.ok(),
    };
    let Some(worker) = worker else {
        ticket.release();
        return interrupt(shared, user_id, &mut progress).await;
    };

    progress.advance(JobState::Dispatched);
    let started = Instant::now();
    let call = tokio::time::timeout(settings.timeout, shared.provider.complete(&msg.text));
    let result = tokio::select! {
        outcome = call => match outcome {
            Ok(result) => result,
            Err(_) => Err(TollgateError::ProviderTimeout {
                duration: settings.timeout,
            }),
        },
        _ = shared.abort.cancelled() => {
            shared.note_interrupted();
            Err(TollgateError::Provider {
                message: "request interrupted by shutdown".into(),
                source: None,
            })
        }
    };
    drop(worker);

    let (reply, outcome) = match result {
        Ok(text) => {
            progress.advance(JobState::Succeeded);
            (text, UsageOutcome::Succeeded)
        }
        Err(e) => {
            warn!(
                user_id = %user_id,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "completion failed"
            );
            progress.advance(JobState::Failed);
            (settings.fallback_reply.clone(), UsageOutcome::Failed)
        }
    };

    let charged = if outcome == UsageOutcome::Failed && settings.charge_only_on_success {
        ticket.release();
        ChargeKind::None
    } else {
        match ticket.commit().await {
            Ok(_) => kind,
            Err(e) => {
                error!(user_id = %user_id, charge = %kind, error = %e, "charge commit failed");
                ChargeKind::None
            }
        }
    };

    let record = UsageRecord {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.clone(),
        request_text: truncate_chars(&msg.text, USAGE_TEXT_LIMIT),
        response_text: truncate_chars(&reply, USAGE_TEXT_LIMIT),
        approx_tokens: approx_tokens(&reply),
        charge_kind: charged,
        cost_cents: shared.ledger.policy().cost_of(charged),
        outcome,
        created_at: String::new(),
    };
    if let Err(e) = usage::insert_usage(shared.ledger.database(), &record).await {
        warn!(user_id = %user_id, error = %e, "usage record not written");
    }

    shared.deliver(user_id, &reply).await;

    info!(
        user_id = %user_id,
        charge = %charged,
        outcome = %outcome,
        total_ms = job.received_at.elapsed().as_millis() as u64,
        "request settled"
    );
    progress.advance(JobState::Settled)
}

/// Answers a job that never reached the provider with the busy reply.
async fn interrupt(shared: &Shared, user_id: &UserId, progress: &mut Progress<'_>) -> JobState {
    info!(user_id = %user_id, "request interrupted before dispatch");
    shared.note_interrupted();
    shared.deliver(user_id, messages::BUSY).await;
    progress.advance(JobState::Interrupted)
}
