use std::sync::Arc;

use tokio::sync::watch;

/// Handle used to request cancellation of streams and watch loops.
///
/// Clones share the same flag; once aborted it stays aborted.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    /// Creates a handle in the not-aborted state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation. Safe to call more than once.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once `abort` has been called on any clone.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a signal that background tasks can wait on.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of an [`AbortHandle`].
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Returns true if cancellation has been requested.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested.
    ///
    /// Never resolves if every handle is dropped without aborting.
    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_resolves_after_abort_from_any_clone() {
        let handle = AbortHandle::new();
        let mut signal = handle.signal();
        assert!(!signal.is_aborted());

        let clone = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            clone.abort();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.aborted())
            .await
            .expect("signal should resolve");
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn signal_created_after_abort_is_already_aborted() {
        let handle = AbortHandle::new();
        handle.abort();
        handle.abort();
        let mut signal = handle.signal();
        assert!(signal.is_aborted());
        signal.aborted().await;
    }

    #[tokio::test]
    async fn dropped_handle_never_resolves_signal() {
        let handle = AbortHandle::new();
        let mut signal = handle.signal();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(waited.is_err());
    }
}
