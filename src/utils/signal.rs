use std::sync::Arc;
use tokio::sync::watch;

/// Broadcast stop signal shared by every capture worker, the aggregator and
/// the refresh loop.
///
/// Blocking workers poll [`StopSignal::is_triggered`] between reads; async
/// tasks await [`StopSignal::triggered`] inside their `select!`.
#[derive(Clone, Debug)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Trigger the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal has been triggered.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of self, so this cannot fail
        // while we hold `self`.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_all_clones() {
        let stop = StopSignal::new();
        let a = stop.clone();
        let b = stop.clone();

        let waiter_a = tokio::spawn(async move { a.triggered().await });
        let waiter_b = tokio::spawn(async move { b.triggered().await });

        assert!(!stop.is_triggered());
        stop.trigger();
        assert!(stop.is_triggered());

        tokio::time::timeout(Duration::from_secs(1), async {
            waiter_a.await.unwrap();
            waiter_b.await.unwrap();
        })
        .await
        .expect("waiters should observe the stop signal");
    }

    #[tokio::test]
    async fn test_triggered_resolves_when_already_stopped() {
        let stop = StopSignal::new();
        stop.trigger();
        stop.trigger();
        tokio::time::timeout(Duration::from_millis(100), stop.triggered())
            .await
            .expect("already-triggered signal resolves immediately");
    }
}
