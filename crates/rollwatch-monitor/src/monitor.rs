//! Monitor engine, the single polling loop shared by every backend.
//!
//! A run checks that the release exists, then queries the backend once per
//! poll interval until one of four things happens first: a breach (roll
//! back), a failed query, the overall timeout, or an operator interrupt.
//! The timeout watcher and interrupt forwarding only ever record a reason
//! in the shared [`Canceller`]; the loop is the sole actor.

use std::io::Write;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use rollwatch_core::{BreachIndicator, MonitorConfig, RunOutcome};
use rollwatch_release::ReleaseController;
use rollwatch_signal::{QueryError, SignalBackend};

use crate::cancel::{Canceller, StopReason, stopped};
use crate::error::{MonitorError, MonitorResult};

/// How the polling loop ended.
enum Decision {
    Breach(BreachIndicator),
    QueryFailed(QueryError),
    Stopped(StopReason),
}

pub struct Monitor {
    config: MonitorConfig,
    canceller: Canceller,
    out: Box<dyn Write + Send + Sync>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            canceller: Canceller::new(),
            out: Box::new(std::io::stdout()),
        }
    }

    /// Write progress lines somewhere other than stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send + Sync>) -> Self {
        self.out = out;
        self
    }

    /// Handle for stopping the run from outside, e.g. on SIGINT.
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Monitor the release until it reaches a terminal outcome.
    pub async fn run(
        mut self,
        backend: &dyn SignalBackend,
        controller: &dyn ReleaseController,
    ) -> MonitorResult<RunOutcome> {
        self.config.validate()?;
        let release = self.config.release_name.clone();

        controller
            .release_status(&release)
            .await
            .map_err(|source| MonitorError::Preflight {
                release: release.clone(),
                source,
            })?;

        self.say(&format!("Monitoring {release}..."));
        info!(
            %release,
            backend = backend.name(),
            interval_secs = self.config.poll_interval.as_secs_f64(),
            timeout_secs = self.config.overall_timeout.as_secs_f64(),
            threshold = self.config.threshold,
            "monitoring started"
        );

        let watcher = spawn_timeout_watcher(self.canceller.clone(), self.config.overall_timeout);
        let decision = self.poll(backend).await;
        watcher.abort();

        match decision {
            Decision::Breach(observed) => {
                self.say("Failure detected, rolling back...");
                warn!(%release, observed, threshold = self.config.threshold, "breach detected");

                controller
                    .rollback(&release, &self.config.rollback)
                    .await
                    .map_err(|source| MonitorError::Rollback {
                        release: release.clone(),
                        source,
                    })?;

                self.say("Successfully rolled back to previous revision!");
                info!(%release, "release rolled back");
                Ok(RunOutcome::RolledBack { observed })
            }
            Decision::QueryFailed(e) => Err(MonitorError::Query(e)),
            Decision::Stopped(StopReason::TimedOut) => {
                let secs = self.config.overall_timeout.as_secs();
                self.say(&format!("No results after {secs} second(s)"));
                info!(%release, "monitoring timed out without a breach");
                Ok(RunOutcome::TimedOut)
            }
            // `Engine` is only recorded by the loop itself, which returns a
            // breach or failure instead of waiting on the latch.
            Decision::Stopped(StopReason::Interrupted | StopReason::Engine) => {
                debug!(%release, "quitting");
                Ok(RunOutcome::Cancelled)
            }
        }
    }

    /// Tick until a breach, a failed query, or a recorded stop reason.
    ///
    /// The ticker is owned by this future, so it is gone before the caller
    /// acts on the decision.
    async fn poll(&self, backend: &dyn SignalBackend) -> Decision {
        let interval = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop_rx = self.canceller.subscribe();
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                biased;
                reason = stopped(&mut stop_rx) => return Decision::Stopped(reason),
                _ = ticker.tick() => {
                    tick += 1;
                    debug!(tick, request = %backend.describe(), "querying backend");

                    match backend.query().await {
                        Err(e) => {
                            return match self.canceller.claim(StopReason::Engine) {
                                Ok(()) => Decision::QueryFailed(e),
                                Err(winner) => Decision::Stopped(winner),
                            };
                        }
                        Ok(observed) if self.config.is_breach(observed) => {
                            return match self.canceller.claim(StopReason::Engine) {
                                Ok(()) => Decision::Breach(observed),
                                Err(winner) => Decision::Stopped(winner),
                            };
                        }
                        Ok(observed) => {
                            debug!(tick, observed, threshold = self.config.threshold, "no breach");
                        }
                    }
                }
            }
        }
    }

    fn say(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "failed to write progress line");
        }
    }
}

fn spawn_timeout_watcher(canceller: Canceller, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if canceller.cancel(StopReason::TimedOut) {
            debug!(secs = after.as_secs(), "overall timeout elapsed");
        }
    })
}
