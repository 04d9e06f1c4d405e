// SPDX-License-Identifier: MPL-2.0

//! power-profiles-daemon D-Bus client for tracking the power-saver mode.

use calloop::channel::Sender;
use futures::StreamExt;
use tokio::sync::watch;
use zbus::{Connection, proxy};

use crate::engine::{EngineEvent, PowerSaveSource};

/// Profile name power-profiles-daemon reports while saving power.
pub const POWER_SAVER_PROFILE: &str = "power-saver";

#[proxy(
    interface = "net.hadess.PowerProfiles",
    default_service = "net.hadess.PowerProfiles",
    default_path = "/net/hadess/PowerProfiles"
)]
trait PowerProfiles {
    /// One of `power-saver`, `balanced` or `performance`.
    #[zbus(property)]
    fn active_profile(&self) -> zbus::Result<String>;
}

#[must_use]
pub fn is_power_saver(profile: &str) -> bool {
    profile == POWER_SAVER_PROFILE
}

/// Latest power-saver state published by a [`PowerSaveMonitor`].
#[derive(Debug, Clone)]
pub struct PowerSaveHandle {
    rx: watch::Receiver<bool>,
}

impl PowerSaveHandle {
    /// Wait for the power-saver state to change.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

impl PowerSaveSource for PowerSaveHandle {
    fn is_power_save_active(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Watches the active power profile.
pub struct PowerSaveMonitor {
    tx: watch::Sender<bool>,
    engine: Option<Sender<EngineEvent>>,
}

impl PowerSaveMonitor {
    /// Create a monitor that forwards every change to `engine`, if given.
    pub fn new(engine: Option<Sender<EngineEvent>>) -> (Self, PowerSaveHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { tx, engine }, PowerSaveHandle { rx })
    }

    /// Read the current profile, then keep following it on a spawned task.
    pub async fn start(self) -> zbus::Result<()> {
        let connection = Connection::system().await?;
        let profiles = PowerProfilesProxy::new(&connection).await?;

        let profile = profiles.active_profile().await.unwrap_or_default();
        self.publish(is_power_saver(&profile));
        tracing::info!(%profile, "Power-save monitor started");

        tokio::spawn(async move {
            if let Err(err) = self.monitor_loop(profiles).await {
                tracing::error!(?err, "Power-save monitor error");
            }
        });

        Ok(())
    }

    async fn monitor_loop(self, profiles: PowerProfilesProxy<'static>) -> zbus::Result<()> {
        let mut changes = profiles.receive_active_profile_changed().await;

        while let Some(change) = changes.next().await {
            match change.get().await {
                Ok(profile) => {
                    tracing::debug!(%profile, "Power profile changed");
                    self.publish(is_power_saver(&profile));
                }
                Err(err) => tracing::warn!(?err, "Unreadable power profile"),
            }
        }

        tracing::warn!("Power profile stream ended");
        Ok(())
    }

    /// Store the new state and forward it when it differs. Returns whether it changed.
    fn publish(&self, active: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != active;
            *current = active;
            changed
        });

        if changed {
            if let Some(engine) = &self.engine {
                if engine.send(EngineEvent::PowerSaveChanged(active)).is_err() {
                    tracing::debug!(active, "Engine gone, power-save change not forwarded");
                }
            }
        }

        changed
    }
}

/// Start the power-save monitor on its own thread and return a handle.
///
/// If the daemon is unreachable the handle keeps reporting `false`.
pub fn start_power_save_monitor(engine: Option<Sender<EngineEvent>>) -> Option<PowerSaveHandle> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .ok()?;

    let (monitor, handle) = PowerSaveMonitor::new(engine);

    std::thread::Builder::new()
        .name("anadrome-power".into())
        .spawn(move || {
            rt.block_on(async {
                if let Err(err) = monitor.start().await {
                    tracing::error!(?err, "Failed to start power-save monitor");
                }
                std::future::pending::<()>().await
            });
        })
        .ok()?;

    Some(handle)
}
