// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The completion dispatcher.
//!
//! ```text
//! handle_message()
//!   ├─ "/cmd"  ─► CommandRouter (inline)
//!   └─ text    ─► queue.try_send(job) ──┐   full / draining ─► busy reply
//!                                       ▼
//!         pump task: recv ─► intake permit ─► tracker.spawn(job::run)
//!                                                 │
//!             admit (account lock) ─► worker permit ─► provider
//! ```
//!
//! A worker permit is only taken once the account lock is held, so a user
//! with a backlog parks at most one worker and other accounts keep moving.
//! Intake permits bound how many jobs wait on locks and workers at once.
//!
//! `handle_message` never waits on the provider. Shutdown closes the queue,
//! lets the pump hand out what is already queued, and waits for in-flight
//! jobs up to the drain timeout. Past the timeout, jobs still waiting are
//! answered with the busy reply and running calls with the fallback.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use tollgate_config::model::DispatchConfig;
use tollgate_core::{
    ChannelAdapter, InboundMessage, OutboundMessage, PluginAdapter, ProviderAdapter, UserId,
};
use tollgate_ledger::AccountLedger;
use tollgate_payments::Reconciler;

use crate::commands::{Command, CommandRouter};
use crate::job::{self, Job, JobState};
use crate::messages;

/// How long interrupted jobs get to deliver their replies after the drain
/// timeout fires.
const ABORT_GRACE: Duration = Duration::from_secs(2);

/// Runtime knobs, usually from the `[dispatch]` section.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub timeout: Duration,
    pub max_concurrency: usize,
    pub queue_capacity: usize,
    pub drain_timeout: Duration,
    pub charge_only_on_success: bool,
    pub fallback_reply: String,
}

impl DispatchSettings {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_concurrency: config.max_concurrency.max(1),
            queue_capacity: config.queue_capacity.max(1),
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
            charge_only_on_success: config.charge_only_on_success,
            fallback_reply: config.fallback_reply.clone(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Messages accepted onto the queue.
    pub accepted: u64,
    /// Messages turned away with the busy reply.
    pub busy: u64,
    pub denied: u64,
    pub settled: u64,
    /// Jobs cut short by an expired drain.
    pub interrupted: u64,
    pub queued: usize,
    pub in_flight: usize,
}

/// Result of [`Dispatcher::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Every queued and in-flight job finished within the timeout.
    pub drained: bool,
    pub settled: u64,
    pub denied: u64,
    /// Queued jobs answered with the busy reply when the drain gave up.
    pub abandoned: u64,
    /// Started jobs answered early (busy or fallback) when the drain gave up.
    pub interrupted: u64,
    /// Jobs still running after the abort grace period.
    pub in_flight: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    busy: AtomicU64,
    denied: AtomicU64,
    settled: AtomicU64,
    interrupted: AtomicU64,
    abandoned: AtomicU64,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
}

/// State shared by the dispatcher front end and its jobs.
pub(crate) struct Shared {
    pub ledger: Arc<AccountLedger>,
    pub provider: Arc<dyn ProviderAdapter>,
    pub channel: Arc<dyn ChannelAdapter>,
    pub settings: DispatchSettings,
    /// Provider slots, `max_concurrency` wide.
    pub workers: Semaphore,
    /// Cancelled when the drain timeout expires.
    pub abort: CancellationToken,
    counters: Counters,
}

impl Shared {
    /// Sends a text to a user; failures are logged, never returned.
    pub async fn deliver(&self, user_id: &UserId, text: &str) {
        if let Err(e) = self
            .channel
            .deliver(OutboundMessage::new(user_id.clone(), text))
            .await
        {
            warn!(user_id = %user_id, error = %e, "delivery failed");
        }
    }

    pub fn note_interrupted(&self) {
        self.counters.interrupted.fetch_add(1, Ordering::Relaxed);
    }
}

/// Accepts chat messages and runs completions in the background.
pub struct Dispatcher {
    shared: Arc<Shared>,
    commands: CommandRouter,
    queue: mpsc::Sender<Job>,
    draining: CancellationToken,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Starts the dispatcher and its pump task. Must be called inside a
    /// Tokio runtime.
    pub fn start(
        ledger: Arc<AccountLedger>,
        reconciler: Arc<Reconciler>,
        provider: Arc<dyn ProviderAdapter>,
        channel: Arc<dyn ChannelAdapter>,
        settings: DispatchSettings,
    ) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let commands = CommandRouter::new(ledger.clone(), reconciler, channel.clone());
        let shared = Arc::new(Shared {
            ledger,
            provider,
            channel,
            workers: Semaphore::new(settings.max_concurrency.max(1)),
            abort: CancellationToken::new(),
            settings,
            counters: Counters::default(),
        });
        let tracker = TaskTracker::new();
        let draining = CancellationToken::new();

        // The pump lives on the tracker too, so one wait covers everything.
        tracker.spawn(pump(shared.clone(), rx, tracker.clone(), draining.clone()));

        info!(
            max_concurrency = shared.settings.max_concurrency,
            queue_capacity = shared.settings.queue_capacity,
            timeout_secs = shared.settings.timeout.as_secs(),
            "dispatcher started"
        );

        Self {
            shared,
            commands,
            queue: tx,
            draining,
            tracker,
        }
    }

    /// Entry point for every inbound chat message. Never fails.
    ///
    /// Commands are answered before this returns; other text is queued and
    /// answered later.
    pub async fn handle_message(&self, msg: InboundMessage) {
        if let Some(command) = Command::parse(&msg.text) {
            self.commands.handle(&msg, command).await;
            return;
        }
        if msg.text.trim().is_empty() {
            debug!(user_id = %msg.user_id, "ignoring empty message");
            return;
        }

        let user_id = msg.user_id.clone();
        if self.draining.is_cancelled() {
            self.turn_away(&user_id, "dispatcher draining").await;
            return;
        }

        let counters = &self.shared.counters;
        counters.queued.fetch_add(1, Ordering::SeqCst);
        match self.queue.try_send(Job::new(msg)) {
            Ok(()) => {
                counters.accepted.fetch_add(1, Ordering::Relaxed);
                debug!(user_id = %user_id, "request queued");
            }
            Err(e) => {
                counters.queued.fetch_sub(1, Ordering::SeqCst);
                let why = match e {
                    TrySendError::Full(_) => "dispatch queue full",
                    TrySendError::Closed(_) => "dispatcher draining",
                };
                self.turn_away(&user_id, why).await;
            }
        }
    }

    async fn turn_away(&self, user_id: &UserId, why: &'static str) {
        warn!(user_id = %user_id, reason = why, "request turned away");
        self.shared.counters.busy.fetch_add(1, Ordering::Relaxed);
        self.shared.deliver(user_id, messages::BUSY).await;
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.shared.counters;
        DispatchStats {
            accepted: c.accepted.load(Ordering::Relaxed),
            busy: c.busy.load(Ordering::Relaxed),
            denied: c.denied.load(Ordering::Relaxed),
            settled: c.settled.load(Ordering::Relaxed),
            interrupted: c.interrupted.load(Ordering::Relaxed),
            queued: c.queued.load(Ordering::SeqCst),
            in_flight: c.in_flight.load(Ordering::SeqCst),
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.shared.settings
    }

    /// Stops accepting work and waits up to `drain_timeout` for queued and
    /// in-flight jobs. When that runs out, every remaining job is answered
    /// (busy reply or fallback) within a short grace period. Safe to call
    /// more than once.
    pub async fn shutdown(&self, drain_timeout: Duration) -> DrainReport {
        let started = Instant::now();
        self.draining.cancel();
        self.tracker.close();
        info!(
            queued = self.shared.counters.queued.load(Ordering::SeqCst),
            in_flight = self.shared.counters.in_flight.load(Ordering::SeqCst),
            timeout_ms = drain_timeout.as_millis() as u64,
            "draining dispatcher"
        );

        let drained = tokio::time::timeout(drain_timeout, self.tracker.wait())
            .await
            .is_ok();

        if !drained {
            self.shared.abort.cancel();
            if tokio::time::timeout(ABORT_GRACE, self.tracker.wait())
                .await
                .is_err()
            {
                warn!("interrupted jobs did not finish within the grace period");
            }
        }

        let stats = self.stats();
        let report = DrainReport {
            drained,
            settled: stats.settled,
            denied: stats.denied,
            abandoned: self.shared.counters.abandoned.load(Ordering::Relaxed),
            interrupted: stats.interrupted,
            in_flight: stats.in_flight,
            elapsed: started.elapsed(),
        };
        if drained {
            info!(settled = report.settled, "dispatcher drained");
        } else {
            warn!(
                abandoned = report.abandoned,
                interrupted = report.interrupted,
                in_flight = report.in_flight,
                "drain timeout reached, remaining requests answered early"
            );
        }
        // The channel stays up: late messages still get the busy reply.
        if let Err(e) = self.shared.provider.shutdown().await {
            warn!(adapter = %self.shared.provider.label(), error = %e, "provider shutdown failed");
        }
        report
    }
}

/// Moves jobs from the queue onto the tracker. At most
/// `max_concurrency + queue_capacity` jobs are spawned at once; they wait
/// there for their account lock and a worker.
async fn pump(
    shared: Arc<Shared>,
    mut rx: mpsc::Receiver<Job>,
    tracker: TaskTracker,
    draining: CancellationToken,
) {
    let intake = Arc::new(Semaphore::new(
        shared.settings.max_concurrency + shared.settings.queue_capacity,
    ));
    let mut closing = false;

    loop {
        let job = tokio::select! {
            job = rx.recv() => job,
            _ = draining.cancelled(), if !closing => {
                // Already-queued jobs stay receivable; new sends fail.
                rx.close();
                closing = true;
                debug!("dispatch queue closed");
                continue;
            }
        };
        let Some(job) = job else {
            break;
        };

        let permit = tokio::select! {
            permit = intake.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => {
                    warn!("dispatch intake closed");
                    abandon(&shared, job).await;
                    break;
                }
            },
            _ = shared.abort.cancelled() => {
                abandon(&shared, job).await;
                break;
            }
        };

        // In-flight first so the job is never invisible to both counters.
        shared.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        shared.counters.queued.fetch_sub(1, Ordering::SeqCst);
        let shared = shared.clone();
        tracker.spawn(async move {
            let _permit = permit;
            let state = job::run(&shared, job).await;
            match state {
                JobState::Denied => shared.counters.denied.fetch_add(1, Ordering::Relaxed),
                JobState::Interrupted => 0,
                _ => shared.counters.settled.fetch_add(1, Ordering::Relaxed),
            };
            shared.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    // Whatever is still queued after an abort gets the busy reply.
    rx.close();
    while let Some(job) = rx.recv().await {
        abandon(&shared, job).await;
    }
    debug!("dispatch pump exited");
}

async fn abandon(shared: &Shared, job: Job) {
    let user_id = &job.message.user_id;
    debug!(user_id = %user_id, "queued request abandoned at shutdown");
    shared.counters.queued.fetch_sub(1, Ordering::SeqCst);
    shared.counters.abandoned.fetch_add(1, Ordering::Relaxed);
    shared.deliver(user_id, messages::BUSY).await;
}
