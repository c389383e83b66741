//! The poll loop driving the pipeline.
//!
//! ```text
//! LISTENING ──package──▶ DISPATCH (filter → format → send) ──▶ LISTENING
//!     │ ──empty────▶ IDLE_WAIT(idle_delay) ──▶ LISTENING
//!     │ ──transient─▶ BACKOFF(policy.delay(n)) ──▶ LISTENING
//!     └ ──fatal─────▶ return Err(PollError)
//! ```
//!
//! Packages are handled one at a time; the next poll starts only after the
//! current package has been delivered or dropped.

use killwatch_core::{Category, FeedPackage, HealthMonitor, Watchlist, evaluate};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::esi::ReferenceSource;
use crate::format::MessageFormatter;
use crate::matrix::ChatBackend;
use crate::redisq::{FeedSource, PollError};
use crate::sender::NotificationSender;

/// Bounded exponential backoff for transient poll failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Timing knobs for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause after an empty poll.
    pub idle_delay: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Counters for one run of the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Completed polls, with or without a package.
    pub polls: u64,
    pub received: u64,
    pub relevant: u64,
    pub delivered: u64,
}

pub struct KillmailPoller<F, S, C> {
    feed: F,
    watchlist: Watchlist,
    formatter: MessageFormatter<S, C>,
    sender: NotificationSender<C>,
    health: Arc<HealthMonitor>,
    settings: PollSettings,
    running: Arc<AtomicBool>,
}

impl<F, S, C> KillmailPoller<F, S, C>
where
    F: FeedSource,
    S: ReferenceSource,
    C: ChatBackend,
{
    pub fn new(
        feed: F,
        watchlist: Watchlist,
        formatter: MessageFormatter<S, C>,
        sender: NotificationSender<C>,
        health: Arc<HealthMonitor>,
        settings: PollSettings,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            feed,
            watchlist,
            formatter,
            sender,
            health,
            settings,
            running,
        }
    }

    /// Poll until the running flag clears or a fatal error occurs.
    pub async fn run(&self) -> Result<PollStats, PollError> {
        let mut stats = PollStats::default();
        let mut failures: u32 = 0;

        gauge!(killwatch_core::metrics::RUNNING).set(1.0);
        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                tracing::info!("poll loop stopping");
                break Ok(stats);
            }

            match self.poll_once(&mut stats).await {
                Ok(()) => failures = 0,
                Err(e) if e.is_fatal() => {
                    counter!(killwatch_core::metrics::POLL_ERRORS_TOTAL, "kind" => "fatal")
                        .increment(1);
                    tracing::error!(error = %e, "fatal feed error, stopping");
                    break Err(e);
                }
                Err(e) => {
                    counter!(killwatch_core::metrics::POLL_ERRORS_TOTAL, "kind" => "transient")
                        .increment(1);
                    failures = failures.saturating_add(1);
                    let delay = self.settings.backoff.delay(failures);
                    tracing::warn!(
                        error = %e,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "feed poll failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };
        gauge!(killwatch_core::metrics::RUNNING).set(0.0);

        result
    }

    /// One long-poll and, if a package arrived, its full pipeline.
    pub async fn poll_once(&self, stats: &mut PollStats) -> Result<(), PollError> {
        let package = match self.feed.listen().await {
            Ok(package) => package,
            Err(e) => {
                if e.responded {
                    self.record_poll(stats);
                }
                return Err(e);
            }
        };
        self.record_poll(stats);

        match package {
            Some(package) => self.handle_package(&package, stats).await,
            None => {
                tracing::trace!("no killmail queued, idling");
                tokio::time::sleep(self.settings.idle_delay).await;
            }
        }
        Ok(())
    }

    /// The feed answered, whether or not its body was usable.
    fn record_poll(&self, stats: &mut PollStats) {
        self.health.touch(Category::Poll);
        stats.polls += 1;
        counter!(killwatch_core::metrics::POLLS_TOTAL).increment(1);
    }

    async fn handle_package(&self, package: &FeedPackage, stats: &mut PollStats) {
        let killmail = &package.killmail;
        stats.received += 1;
        counter!(killwatch_core::metrics::KILLMAILS_RECEIVED_TOTAL).increment(1);

        let verdict = evaluate(killmail, &self.watchlist);
        if !verdict.is_relevant {
            tracing::trace!(killmail_id = killmail.killmail_id, "killmail not relevant");
            return;
        }

        stats.relevant += 1;
        counter!(
            killwatch_core::metrics::KILLMAILS_RELEVANT_TOTAL,
            "reason" => verdict.reason.as_str()
        )
        .increment(1);
        tracing::debug!(
            killmail_id = killmail.killmail_id,
            reason = verdict.reason.as_str(),
            "relevant killmail"
        );

        let Some(notification) = self.formatter.format(killmail, &verdict, &package.zkb).await
        else {
            return;
        };

        if self.sender.send(&notification).await {
            stats.delivered += 1;
        }
    }
}
