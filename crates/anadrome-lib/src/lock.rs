// SPDX-License-Identifier: MPL-2.0

//! systemd-logind D-Bus client for tracking the screen-lock state.
//!
//! Session `Unlock` means the user is back; session `Lock` and the manager's
//! `PrepareForSleep(true)` both mean the screen went dark.

use calloop::channel::Sender;
use futures::StreamExt;
use tokio::sync::watch;
use zbus::{Connection, proxy};

use crate::engine::{EngineEvent, LockSource};

#[proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/session/auto"
)]
trait Session {
    #[zbus(signal)]
    fn lock(&self) -> zbus::Result<()>;

    #[zbus(signal)]
    fn unlock(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn locked_hint(&self) -> zbus::Result<bool>;
}

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait Manager {
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// Latest lock state published by a [`LockMonitor`].
#[derive(Debug, Clone)]
pub struct LockHandle {
    rx: watch::Receiver<bool>,
}

impl LockHandle {
    /// Wait for the lock state to change.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

impl LockSource for LockHandle {
    fn is_unlocked(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Watches the caller's login session.
pub struct LockMonitor {
    tx: watch::Sender<bool>,
    engine: Option<Sender<EngineEvent>>,
}

impl LockMonitor {
    /// Create a monitor that forwards lock transitions to `engine`, if given.
    ///
    /// The handle reports unlocked until the session has been queried.
    pub fn new(engine: Option<Sender<EngineEvent>>) -> (Self, LockHandle) {
        let (tx, rx) = watch::channel(true);
        (Self { tx, engine }, LockHandle { rx })
    }

    pub async fn start(self) -> zbus::Result<()> {
        let connection = Connection::system().await?;
        let session = SessionProxy::new(&connection).await?;
        let manager = ManagerProxy::new(&connection).await?;

        let locked = session.locked_hint().await.unwrap_or(false);
        self.publish(!locked);
        tracing::info!(locked, "Lock monitor started");

        tokio::spawn(async move {
            if let Err(err) = self.monitor_loop(session, manager).await {
                tracing::error!(?err, "Lock monitor error");
            }
        });

        Ok(())
    }

    async fn monitor_loop(
        self,
        session: SessionProxy<'static>,
        manager: ManagerProxy<'static>,
    ) -> zbus::Result<()> {
        let mut locks = session.receive_lock().await?;
        let mut unlocks = session.receive_unlock().await?;
        let mut sleeps = manager.receive_prepare_for_sleep().await?;

        loop {
            tokio::select! {
                Some(_) = locks.next() => {
                    tracing::debug!("Session locked");
                    self.publish(false);
                }
                Some(_) = unlocks.next() => {
                    tracing::debug!("Session unlocked");
                    self.publish(true);
                }
                Some(signal) = sleeps.next() => {
                    match signal.args() {
                        Ok(args) if *args.start() => {
                            tracing::debug!("Preparing for sleep");
                            self.publish(false);
                        }
                        Ok(_) => tracing::debug!("Resumed from sleep"),
                        Err(err) => tracing::warn!(?err, "Malformed PrepareForSleep signal"),
                    }
                }
                else => {
                    tracing::warn!("All lock monitoring streams ended");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Store the new state and forward the transition. Returns whether it changed.
    fn publish(&self, unlocked: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != unlocked;
            *current = unlocked;
            changed
        });

        if changed {
            if let Some(engine) = &self.engine {
                let event = if unlocked {
                    EngineEvent::Unlocked
                } else {
                    EngineEvent::ScreenOff
                };
                if engine.send(event).is_err() {
                    tracing::debug!(unlocked, "Engine gone, lock change not forwarded");
                }
            }
        }

        changed
    }
}

/// Start the lock monitor on its own thread and return a handle.
pub fn start_lock_monitor(engine: Option<Sender<EngineEvent>>) -> Option<LockHandle> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .ok()?;

    let (monitor, handle) = LockMonitor::new(engine);

    std::thread::Builder::new()
        .name("anadrome-lock".into())
        .spawn(move || {
            rt.block_on(async {
                if let Err(err) = monitor.start().await {
                    tracing::error!(?err, "Failed to start lock monitor");
                }
                std::future::pending::<()>().await
            });
        })
        .ok()?;

    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unlocked() {
        let (_monitor, handle) = LockMonitor::new(None);
        assert!(handle.is_unlocked());
    }

    #[test]
    fn publish_reports_only_transitions() {
        let (monitor, handle) = LockMonitor::new(None);

        assert!(!monitor.publish(true));
        assert!(monitor.publish(false));
        assert!(!handle.is_unlocked());
        assert!(!monitor.publish(false));
        assert!(monitor.publish(true));
        assert!(handle.is_unlocked());
    }
}
