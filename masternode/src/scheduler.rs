//! Periodic driver for the activation service

use crate::activation::ActiveMasternode;
use crate::ping::MASTERNODE_PING_SECONDS;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// How often the service is polled; a ping is due at most once per
/// `MASTERNODE_PING_SECONDS`
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(MASTERNODE_PING_SECONDS as u64);

/// Poll `service` every `period` until `shutdown` turns true or its sender
/// is dropped. The first poll happens immediately.
pub async fn run_status_loop(
    service: Arc<Mutex<ActiveMasternode>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let service = service.clone();
        // the connectivity probe blocks
        let polled = tokio::task::spawn_blocking(move || {
            let mut mn = service.blocking_lock();
            mn.manage_status();
            mn.status_message()
        })
        .await;

        match polled {
            Ok(status) => log::debug!("status loop - {}", status),
            Err(e) => log::error!("status loop - poll task failed: {}", e),
        }
    }

    log::info!("status loop - stopped");
}

/// Spawn [`run_status_loop`] on the current runtime
pub fn spawn_status_loop(
    service: Arc<Mutex<ActiveMasternode>>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_status_loop(service, period, shutdown))
}
