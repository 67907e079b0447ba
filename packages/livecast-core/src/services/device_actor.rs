//! Per-device actor.
//!
//! One task owns the [`ArbitrationEngine`] for a device and is the only
//! place its state changes. Notifications arrive through a bounded mailbox
//! and the mute poll runs on an interval in the same loop, so the two never
//! interleave.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cast::Device;
use crate::error::{LivecastError, LivecastResult};
use crate::notifications::StreamNotification;
use crate::runtime::TaskSpawner;
use crate::services::arbitration::ArbitrationEngine;

/// Sending side of a device actor's mailbox.
#[derive(Debug, Clone)]
pub struct DeviceActorHandle {
    device: Device,
    tx: mpsc::Sender<StreamNotification>,
}

impl DeviceActorHandle {
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Queues a notification, waiting if the mailbox is full.
    pub async fn notify(&self, notification: StreamNotification) -> LivecastResult<()> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| LivecastError::ActorStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Completes once the actor loop has exited.
    pub async fn stopped(&self) {
        self.tx.closed().await;
    }
}

/// Spawns the actor loop for `engine`'s device.
///
/// # Arguments
/// * `spawner` - Where to run the loop
/// * `engine` - Arbitration engine, moved into the actor
/// * `mute_poll` - Mute sampling interval, `None` to disable polling
/// * `mailbox_capacity` - Bound on queued notifications (must be >= 1)
/// * `cancel` - Stops the loop between events
pub fn spawn_device_actor<S: TaskSpawner>(
    spawner: &S,
    engine: ArbitrationEngine,
    mute_poll: Option<Duration>,
    mailbox_capacity: usize,
    cancel: CancellationToken,
) -> DeviceActorHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let device = engine.device().clone();

    spawner.spawn(async move {
        run_device_actor(engine, rx, mute_poll, cancel).await;
    });

    DeviceActorHandle { device, tx }
}

/// Runs until cancelled or until every handle is dropped. Returns the engine.
pub async fn run_device_actor(
    mut engine: ArbitrationEngine,
    mut rx: mpsc::Receiver<StreamNotification>,
    mute_poll: Option<Duration>,
    cancel: CancellationToken,
) -> ArbitrationEngine {
    let mut poll = mute_poll.map(|period| {
        let mut poll = interval(period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll
    });

    log::info!(
        "[DeviceActor] Started for {} (mute poll: {:?})",
        engine.device(),
        mute_poll
    );

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            notification = rx.recv() => {
                let Some(notification) = notification else {
                    break;
                };
                let outcome = engine.handle(&notification).await;
                log::debug!("[DeviceActor] {:?} -> {:?}", notification, outcome);
            }

            _ = next_tick(&mut poll) => engine.poll_mute().await,
        }
    }

    log::info!("[DeviceActor] Stopped for {}", engine.device());
    engine
}

/// Next poll tick, or never when polling is disabled.
async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(poll) => {
            poll.tick().await;
        }
        None => std::future::pending().await,
    }
}
