//! Shutdown coordination for the gateway.
//!
//! A latched flag on a `watch` channel: listeners created after the trigger
//! still observe it, so a signal that lands during startup is never lost.

use tokio::sync::watch;

/// Owner side of the shutdown flag.
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Cloneable handle that resolves once shutdown has been triggered.
#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Latch the flag. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    /// Wait until shutdown is triggered, or the owner is dropped.
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_listener() {
        let shutdown = Shutdown::new();
        let a = shutdown.listener();
        let b = a.clone();

        shutdown.trigger();
        assert!(shutdown.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), async {
            a.wait().await;
            b.wait().await;
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_late_listener_sees_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();

        let late = shutdown.listener();
        tokio::time::timeout(Duration::from_secs(1), late.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_listener_waits_until_triggered() {
        let shutdown = Shutdown::new();
        let listener = shutdown.listener();

        let pending = tokio::time::timeout(Duration::from_millis(50), listener.clone().wait()).await;
        assert!(pending.is_err());
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), listener.wait())
            .await
            .unwrap();
    }
}
