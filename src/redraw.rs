//! Coalesced redraw requests.
//!
//! Any engine that changes what the next frame shows (style batch, overlay
//! reveal/expiry, menu refresh) calls [`RedrawSignal::request`]. Repeated
//! requests before the frame side consumes them collapse into one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicBool,
    notify: Notify,
}

#[derive(Clone, Debug, Default)]
pub struct RedrawSignal {
    inner: Arc<Inner>,
}

impl RedrawSignal {
    pub fn new() -> Self {
        Self::default()
    }

    // Fire-and-forget; a no-op if a request is already pending.
    pub fn request(&self) {
        if !self.inner.pending.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_one();
        }
    }

    // Consume the pending request, if any.
    pub fn take(&self) -> bool {
        self.inner.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Wait until a redraw is requested, then consume it.
    pub async fn wait(&self) {
        loop {
            if self.take() {
                return;
            }
            self.inner.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_coalesce_until_taken() {
        let signal = RedrawSignal::new();
        assert!(!signal.take());

        signal.request();
        signal.request();
        assert!(signal.is_pending());
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[tokio::test]
    async fn wait_returns_after_request_from_clone() {
        let signal = RedrawSignal::new();
        let other = signal.clone();
        let waiter = tokio::spawn(async move { signal.wait().await });
        other.request();
        waiter.await.unwrap();
        assert!(!other.is_pending());
    }
}
