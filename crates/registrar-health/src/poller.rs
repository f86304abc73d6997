//! Health poller — background task that re-checks one instance's status.
//!
//! Each registered instance with a status URL gets its own poller. On every
//! tick the poller probes the URL and, when the result differs from the last
//! recorded status, hands the new status to a callback that re-announces the
//! instance to the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use registrar_core::{InstanceId, InstanceStatus};

use crate::checker::StatusProbe;

/// Default time between two probes.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Callback invoked when an instance's probed status changes.
pub type StatusCallback =
    Arc<dyn Fn(InstanceId, InstanceStatus) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = ()> + Send>,
>;

/// Parse the `check_interval` attribute (whole seconds, strictly positive).
///
/// Missing values use the default silently; invalid ones log a warning.
pub fn parse_check_interval(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_CHECK_INTERVAL;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        Ok(_) => {
            warn!(value = %raw, "check_interval must be positive, using default");
            DEFAULT_CHECK_INTERVAL
        }
        Err(e) => {
            warn!(value = %raw, error = %e, "check_interval must be a valid integer, using default");
            DEFAULT_CHECK_INTERVAL
        }
    }
}

/// Periodic status checker for a single instance.
pub struct HealthPoller {
    instance_id: InstanceId,
    status_url: String,
    interval: Duration,
    probe: Arc<dyn StatusProbe>,
    on_change: StatusCallback,
}

impl HealthPoller {
    pub fn new(
        instance_id: impl Into<InstanceId>,
        status_url: impl Into<String>,
        probe: Arc<dyn StatusProbe>,
        on_change: StatusCallback,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            status_url: status_url.into(),
            interval: DEFAULT_CHECK_INTERVAL,
            probe,
            on_change,
        }
    }

    /// Set the time between probes.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the polling task.
    ///
    /// `recorded` is the status the instance was announced with; only
    /// probe results that differ from it are reported.
    pub fn spawn(self, recorded: InstanceStatus) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let instance_id = self.instance_id.clone();

        info!(%instance_id, url = %self.status_url, interval = ?self.interval, "health poller started");
        let handle = tokio::spawn(self.run(recorded, shutdown_rx));

        PollerHandle {
            instance_id,
            shutdown_tx,
            handle,
        }
    }

    async fn run(self, mut recorded: InstanceStatus, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    let status = self.probe.probe(&self.status_url).await;
                    if *shutdown.borrow() {
                        debug!(instance_id = %self.instance_id, %status, "stopped during probe, result dropped");
                        break;
                    }
                    if status != recorded {
                        info!(
                            instance_id = %self.instance_id,
                            from = %recorded,
                            to = %status,
                            "instance status changed"
                        );
                        recorded = status;
                        (self.on_change)(self.instance_id.clone(), status).await;
                    } else {
                        debug!(instance_id = %self.instance_id, %status, "instance status unchanged");
                    }
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        info!(instance_id = %self.instance_id, "stop health checking");
    }
}

/// Owner-side control of a running poller.
///
/// Dropping the handle does not stop the task; call [`PollerHandle::stop`].
#[derive(Debug)]
pub struct PollerHandle {
    instance_id: InstanceId,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Raise the stop signal.
    ///
    /// Returns `true` only for the call that actually stopped the poller;
    /// later calls are no-ops.
    pub fn stop(&self) -> bool {
        let stopped = self.shutdown_tx.send_if_modified(|stop| {
            if *stop {
                false
            } else {
                *stop = true;
                true
            }
        });
        if stopped {
            debug!(instance_id = %self.instance_id, "health poller stop signalled");
        }
        stopped
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wait for the task to exit. Only meaningful after [`stop`](Self::stop).
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}
