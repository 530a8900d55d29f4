//! The polling loop that decides when to reconcile.
//!
//! Every tick reads today's active check-ins, feeds them to the
//! [`ChangeDetector`] and runs a pass when something tracked changed or the
//! full-pass interval has elapsed. Passes never overlap: a tick awaits its
//! pass before the loop sleeps.

use std::fmt;
use std::sync::Arc;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::change_detector::ChangeDetector;
use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, PassReport};
use crate::store::{ActiveWindow, QueueStore};

/// Why a tick ran a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileTrigger {
    /// The full-pass interval elapsed (or no full pass has run yet).
    Scheduled,
    /// The detector saw new or modified check-ins.
    Changes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Reconciled {
        trigger: ReconcileTrigger,
        report: PassReport,
    },
}

impl TickOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            TickOutcome::Idle => None,
            TickOutcome::Reconciled { report, .. } => Some(report),
        }
    }
}

pub struct QueueScheduler<S: ?Sized> {
    orchestrator: Orchestrator<S>,
    detector: ChangeDetector,
    clock: Arc<dyn Clock>,
    last_full_pass: Option<Instant>,
}

impl<S: ?Sized> fmt::Debug for QueueScheduler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("orchestrator", &self.orchestrator)
            .field("tracked_check_ins", &self.detector.tracked())
            .field("last_full_pass", &self.last_full_pass)
            .finish()
    }
}

impl<S> QueueScheduler<S>
where
    S: QueueStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(store, config),
            detector: ChangeDetector::new(),
            clock,
            last_full_pass: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.orchestrator.config()
    }

    pub fn orchestrator(&self) -> &Orchestrator<S> {
        &self.orchestrator
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Run one unconditional pass and restart the full-pass timer.
    pub async fn reconcile_now(&mut self) -> Result<PassReport> {
        let report = self.orchestrator.run_pass(self.clock.now()).await?;
        self.last_full_pass = Some(Instant::now());
        Ok(report)
    }

    /// One loop iteration without the sleep.
    ///
    /// When the timer is due and changes were seen on the same tick, a
    /// single pass runs and the timer is reset. A failed pass clears the
    /// detector snapshot so the next tick retries.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let config = self.orchestrator.config();
        let window =
            ActiveWindow::for_day(self.clock.now(), config.utc_offset_minutes)?;
        let full_pass_interval = config.full_pass_interval();

        let active = self.orchestrator.store().active_check_ins(window).await?;
        let changes = self.detector.observe(&active);

        let due = self
            .last_full_pass
            .is_none_or(|at| at.elapsed() >= full_pass_interval);
        let trigger = if due {
            ReconcileTrigger::Scheduled
        } else if changes.has_changes() {
            ReconcileTrigger::Changes
        } else {
            return Ok(TickOutcome::Idle);
        };

        debug!(
            target: "queue::pass",
            ?trigger,
            added = changes.added.len(),
            modified = changes.modified.len(),
            "starting reconciliation pass"
        );

        let report = match self.orchestrator.run_pass(self.clock.now()).await {
            Ok(report) => report,
            Err(err) => {
                self.detector = ChangeDetector::new();
                return Err(err);
            }
        };
        if trigger == ReconcileTrigger::Scheduled {
            self.last_full_pass = Some(Instant::now());
        }

        Ok(TickOutcome::Reconciled { trigger, report })
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// A failed tick is logged and followed by the error backoff instead of
    /// the poll interval. An in-flight pass is abandoned on shutdown; the
    /// next start repairs any half-written state.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let poll = self.config().poll_interval();
        let backoff = self.config().error_backoff();
        info!(
            target: "queue::pass",
            poll_ms = poll.as_millis() as u64,
            full_pass_ms = self.config().full_pass_interval().as_millis() as u64,
            "queue scheduler started"
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.tick() => outcome,
            };

            let pause = match outcome {
                Ok(_) => poll,
                Err(err) => {
                    error!(
                        target: "queue::pass",
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "scheduler tick failed"
                    );
                    backoff
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }

        info!(target: "queue::pass", "queue scheduler stopped");
    }
}
