//! Trailing-edge debouncer for search-driven fetches.
//!
//! Each `schedule` cancels the previously pending action, so a burst of
//! keystrokes inside the window collapses into one fetch carrying the final
//! text.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Quiet period required after the last keystroke before a search fetch
/// fires.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `action` to run after the quiet period, cancelling whatever
    /// was pending. Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let token = CancellationToken::new();
        let previous = self
            .pending
            .lock()
            .expect("debounce lock poisoned")
            .replace(token.clone());
        if let Some(prev) = previous {
            prev.cancel();
        }

        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    action().await;
                }
            }
        });
    }

    /// Drop any pending action without running it.
    pub fn cancel(&self) {
        if let Some(token) = self.pending.lock().expect("debounce lock poisoned").take() {
            token.cancel();
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_action() {
        let debouncer = Debouncer::default();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let fired = fired.clone();
            debouncer.schedule(move || async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::advance(Duration::from_millis(50)).await;
        }
        tokio::time::advance(Duration::from_millis(400)).await;
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_before_the_quiet_period() {
        let debouncer = Debouncer::default();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        debouncer.schedule(move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::advance(Duration::from_millis(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_action() {
        let debouncer = Debouncer::default();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        debouncer.schedule(move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        tokio::time::advance(Duration::from_millis(400)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
