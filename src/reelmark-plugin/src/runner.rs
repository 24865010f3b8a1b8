//! Async driver: feeds host messages to the plugin and fires the fallback
//! flush when its deadline passes.

use crate::plugin::AnalyticsPlugin;
use crate::protocol::{HostMessage, PluginError};
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// Sending half handed to whatever reads host input.
#[derive(Debug, Clone)]
pub struct PluginHandle {
    inbox: mpsc::Sender<HostMessage>,
}

impl PluginHandle {
    pub async fn send(&self, message: HostMessage) -> Result<(), PluginError> {
        self.inbox
            .send(message)
            .await
            .map_err(|_| PluginError::RunnerClosed)
    }

    /// For producers running outside the async runtime.
    pub fn blocking_send(&self, message: HostMessage) -> Result<(), PluginError> {
        self.inbox
            .blocking_send(message)
            .map_err(|_| PluginError::RunnerClosed)
    }
}

/// Totals reported when the runner stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages: usize,
    pub fallback_flushes: usize,
}

pub struct PluginRunner {
    plugin: AnalyticsPlugin,
    inbox: mpsc::Receiver<HostMessage>,
    drain_fallback_on_close: bool,
}

pub fn channel(plugin: AnalyticsPlugin, capacity: usize) -> (PluginHandle, PluginRunner) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        PluginHandle { inbox: tx },
        PluginRunner {
            plugin,
            inbox: rx,
            drain_fallback_on_close: false,
        },
    )
}

impl PluginRunner {
    /// When input closes with a fallback flush armed, wait for its deadline
    /// and fire it before destroying the plugin. Used for recorded logs,
    /// where input ends long before any real-time deadline.
    pub fn drain_fallback_on_close(mut self, drain: bool) -> Self {
        self.drain_fallback_on_close = drain;
        self
    }

    /// Run until the host sends `Destroy` or every handle is dropped.
    pub async fn run(mut self) -> (AnalyticsPlugin, RunSummary) {
        let mut summary = RunSummary::default();
        let mut timer: Option<(u64, Instant)> = None;
        let mut input_closed = false;

        loop {
            timer = match (self.plugin.pending_flush(), timer) {
                (Some(pending), Some((generation, at))) if pending.generation == generation => {
                    Some((generation, at))
                }
                (Some(pending), _) => Some((pending.generation, Instant::now() + pending.delay)),
                (None, _) => None,
            };

            tokio::select! {
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        tracing::debug!("host input closed");
                        input_closed = true;
                        break;
                    };
                    summary.messages += 1;
                    if let ControlFlow::Break(()) = self.plugin.handle_message(message) {
                        tracing::debug!(messages = summary.messages, "plugin destroyed by host");
                        break;
                    }
                }
                () = sleep_until_deadline(timer.map(|(_, at)| at)) => {
                    if let Some((generation, _)) = timer.take() {
                        if self.plugin.fire_fallback(generation) {
                            summary.fallback_flushes += 1;
                        }
                    }
                }
            }
        }

        if input_closed && self.drain_fallback_on_close {
            if let Some((generation, at)) = timer {
                sleep_until(at).await;
                if self.plugin.fire_fallback(generation) {
                    summary.fallback_flushes += 1;
                }
            }
        }

        if !self.plugin.is_destroyed() {
            self.plugin.destroy();
        }
        (self.plugin, summary)
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
