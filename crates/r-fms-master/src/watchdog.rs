//! ---
//! fms_section: "04-liveness"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Heartbeat liveness watchdog for mirrored controllers."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use r_fms_common::config::WatchdogConfig;
use r_fms_common::time::Clock;

use crate::engine::FleetOrchestrator;

/// Periodic liveness scan over every mirrored controller.
///
/// Pure observation: flags silence in the trace stream but never mutates
/// entity state. A controller with no liveness data at all is assumed
/// healthy until somebody updates it.
#[derive(Debug)]
pub struct HeartbeatWatchdog {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl HeartbeatWatchdog {
    pub fn spawn(
        orchestrator: Arc<FleetOrchestrator>,
        clock: Arc<dyn Clock>,
        config: WatchdogConfig,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let max_silence = chrono::Duration::from_std(config.max_heartbeat_silence)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000));
        let task = tokio::spawn(async move {
            let mut sample_interval = tokio::time::interval(config.sample_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("heartbeat watchdog shutdown");
                        break;
                    }
                    _ = sample_interval.tick() => {
                        let sample = clock.now();
                        for controller in orchestrator.all_controllers() {
                            match controller.time_since_last_heartbeat(sample) {
                                Some(silence) if silence > max_silence => {
                                    warn!(
                                        controller = %controller.display_name(),
                                        silence_ms = silence.num_milliseconds(),
                                        "controller heartbeat silence exceeds threshold"
                                    );
                                }
                                Some(_) => {}
                                // No data yet; assume healthy.
                                None => {}
                            }
                        }
                    }
                }
            }
        });
        Self {
            shutdown: shutdown_tx,
            task,
        }
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await?;
        Ok(())
    }
}
