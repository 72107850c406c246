//! Auto-advance scheduling.
//!
//! At most one advance is pending. It is bound to the transcript position it
//! was armed for and is cancelled through its token, never by aborting the
//! task.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug)]
struct PendingAdvance {
    position: usize,
    token: CancellationToken,
}

/// The single pending auto-advance, if any.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    pending: Option<PendingAdvance>,
}

impl TimerSlot {
    /// Replace the pending advance, cancelling the previous one.
    pub(crate) fn arm(&mut self, position: usize, token: CancellationToken) {
        self.cancel();
        self.pending = Some(PendingAdvance { position, token });
    }

    /// Cancel the pending advance. Returns whether one was pending.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Called by a fired timer: clears the slot if it still belongs to
    /// `position`.
    pub(crate) fn disarm(&mut self, position: usize) -> bool {
        match &self.pending {
            Some(pending) if pending.position == position && !pending.token.is_cancelled() => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn armed_position(&self) -> Option<usize> {
        self.pending.as_ref().map(|pending| pending.position)
    }
}

/// Run `action` after `delay` unless `token` is cancelled first.
pub(crate) fn spawn_delayed<F>(token: CancellationToken, delay: Duration, action: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = token.cancelled() => trace!("auto-advance cancelled"),
            () = tokio::time::sleep(delay) => action.await,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn arming_cancels_the_previous_timer() {
        let mut slot = TimerSlot::default();
        let first = CancellationToken::new();
        slot.arm(0, first.clone());
        slot.arm(1, CancellationToken::new());

        assert!(first.is_cancelled());
        assert_eq!(slot.armed_position(), Some(1));
        assert!(!slot.disarm(0));
        assert!(slot.disarm(1));
        assert_eq!(slot.armed_position(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_runs() {
        let fired = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let counter = Arc::clone(&fired);
        let handle = spawn_delayed(token.clone(), Duration::from_secs(2), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        handle.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let counter = Arc::clone(&fired);
        spawn_delayed(CancellationToken::new(), Duration::from_secs(2), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
