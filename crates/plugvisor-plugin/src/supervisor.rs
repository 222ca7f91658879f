// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend process supervision with crash-restart.
//!
//! Every started plugin gets its own restart loop, governed by a child of the
//! supervisor's root [`CancellationToken`]. A loop ends when its plugin is
//! decommissioned, when the token is cancelled, or when an optional deadline
//! passes.

use std::sync::Arc;
use std::time::Duration;

use plugvisor_core::{PlugvisorError, Result};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::entity::{Plugin, ProcessState};

/// How often a restart loop checks whether its process has exited.
pub const RESTART_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default upper bound on a single plugin's stop call.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct ProcessSupervisor {
    root: CancellationToken,
    tasks: TaskTracker,
    poll_interval: Duration,
    stop_timeout: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(RESTART_POLL_INTERVAL, DEFAULT_STOP_TIMEOUT)
    }
}

impl ProcessSupervisor {
    pub fn new(poll_interval: Duration, stop_timeout: Duration) -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: TaskTracker::new(),
            poll_interval,
            stop_timeout,
        }
    }

    /// Starts a managed backend plugin and spawns its restart loop.
    ///
    /// Plugins that are unmanaged or have no backend are left alone.
    pub async fn start(&self, plugin: &Arc<Plugin>) -> Result<()> {
        if !plugin.is_managed() || !plugin.is_backend() {
            return Ok(());
        }

        let ctx = self.root.child_token();
        plugin
            .start(&ctx)
            .await
            .map_err(|e| PlugvisorError::ProcessStart {
                plugin_id: plugin.id().to_string(),
                source: Box::new(e),
            })?;
        plugin.set_state(ProcessState::Running);
        debug!(plugin_id = %plugin.id(), "plugin started");

        let plugin = Arc::clone(plugin);
        let period = self.poll_interval;
        self.tasks.spawn(async move {
            if let Err(e) = restart_killed_process(&plugin, &ctx, period, None).await {
                error!(
                    plugin_id = %plugin.id(),
                    error = %e,
                    "attempt to restart killed plugin process failed"
                );
            }
        });
        Ok(())
    }

    /// Decommissions a plugin and stops its process.
    pub async fn decommission_and_stop(&self, plugin: &Plugin, ctx: &CancellationToken) -> Result<()> {
        debug!(plugin_id = %plugin.id(), "stopping plugin process");
        plugin.decommission();
        self.stop_one(plugin, ctx).await
    }

    /// Stops every given plugin concurrently and waits for all of them.
    ///
    /// Individual failures are logged and do not affect the others.
    pub async fn stop_all(&self, plugins: Vec<Arc<Plugin>>, ctx: &CancellationToken) {
        let mut set = JoinSet::new();
        for plugin in plugins {
            let ctx = ctx.clone();
            let stop_timeout = self.stop_timeout;
            set.spawn(async move {
                debug!(plugin_id = %plugin.id(), "stopping plugin");
                match stop_with_timeout(&plugin, &ctx, stop_timeout).await {
                    Ok(()) => debug!(plugin_id = %plugin.id(), "plugin stopped"),
                    Err(e) => error!(plugin_id = %plugin.id(), error = %e, "failed to stop plugin"),
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "plugin stop task failed");
            }
        }
    }

    /// Cancels every restart loop and waits for them to exit.
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Number of restart loops still running.
    pub fn active_loops(&self) -> usize {
        self.tasks.len()
    }

    async fn stop_one(&self, plugin: &Plugin, ctx: &CancellationToken) -> Result<()> {
        stop_with_timeout(plugin, ctx, self.stop_timeout).await
    }
}

async fn stop_with_timeout(
    plugin: &Plugin,
    ctx: &CancellationToken,
    stop_timeout: Duration,
) -> Result<()> {
    tokio::time::timeout(stop_timeout, plugin.stop(ctx))
        .await
        .map_err(|_| PlugvisorError::Timeout {
            duration: stop_timeout,
        })??;
    plugin.set_state(ProcessState::Stopped);
    Ok(())
}

/// Polls a started plugin every `period`, restarting it whenever its process has exited.
///
/// Returns `Ok(())` on decommission or cancellation, and
/// [`PlugvisorError::Timeout`] once `deadline` passes. Restart failures are
/// logged and retried on the next tick.
pub async fn restart_killed_process(
    plugin: &Plugin,
    ctx: &CancellationToken,
    period: Duration,
    deadline: Option<Instant>,
) -> Result<()> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expired);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Ok(()),
            _ = &mut expired => {
                let duration = deadline.map_or(Duration::ZERO, |at| at.saturating_duration_since(started));
                return Err(PlugvisorError::Timeout { duration });
            }
            _ = ticker.tick() => {
                if plugin.is_decommissioned() {
                    debug!(plugin_id = %plugin.id(), "plugin decommissioned");
                    plugin.set_state(ProcessState::Stopped);
                    return Ok(());
                }

                if !plugin.exited() {
                    continue;
                }
                // a concurrent decommission_and_stop may have caused the exit
                if plugin.is_decommissioned() {
                    debug!(plugin_id = %plugin.id(), "plugin decommissioned while stopping");
                    plugin.set_state(ProcessState::Stopped);
                    return Ok(());
                }

                plugin.set_state(ProcessState::Crashed);
                debug!(plugin_id = %plugin.id(), "restarting plugin");
                match plugin.start(ctx).await {
                    Ok(()) => {
                        plugin.set_state(ProcessState::Running);
                        debug!(plugin_id = %plugin.id(), "plugin restarted");
                    }
                    Err(e) => {
                        error!(plugin_id = %plugin.id(), error = %e, "failed to restart plugin");
                    }
                }
            }
        }
    }
}
