//! One-shot completion latch and deadline racing for native requests.
//!
//! The platform services complete asynchronously, on platform-managed
//! threads. Each outstanding request gets a single outcome slot; the first
//! writer (success callback, failure callback, or the deadline) claims the
//! slot with an atomic compare-and-set, and every later writer becomes a
//! no-op whose value is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

/// Outcome of racing a native request against its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    /// The native completion arrived first.
    Completed(T),
    /// The deadline fired first; any later native completion is discarded.
    TimedOut,
}

/// Shared single-use outcome slot.
struct CompletionSlot<T> {
    claimed: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> CompletionSlot<T> {
    fn channel() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(CompletionSlot {
            claimed: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
        });
        (slot, rx)
    }

    /// Claim the latch and deliver `value`. Returns whether this writer won;
    /// losers leave the slot untouched.
    fn complete(&self, value: T) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // Delivery is best-effort: the receiver may already be gone when the
        // caller stopped waiting.
        if let Some(tx) = self.tx.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(value);
        }
        true
    }
}

/// Write side of one outstanding request, handed to the native completion
/// callback.
pub struct CompletionHandle<T> {
    slot: Arc<CompletionSlot<RaceOutcome<T>>>,
}

impl<T> CompletionHandle<T> {
    /// Deliver the native outcome. Returns `false` when the deadline (or an
    /// earlier writer) already settled the request, in which case `value`
    /// is discarded.
    pub fn complete(self, value: T) -> bool {
        self.slot.complete(RaceOutcome::Completed(value))
    }
}

/// Submit a native request and race its completion against a single-shot
/// deadline.
///
/// `submit` receives the completion handle and must hand it to the native
/// callback; it runs synchronously, so malformed requests surface before
/// the timer is armed. Exactly one [`RaceOutcome`] is produced per call.
pub async fn race_with_deadline<T, F>(bound: Duration, submit: F) -> RaceOutcome<T>
where
    T: Send + 'static,
    F: FnOnce(CompletionHandle<T>),
{
    let (slot, rx) = CompletionSlot::channel();
    submit(CompletionHandle {
        slot: Arc::clone(&slot),
    });

    // The deadline is just a third writer to the same latch.
    let deadline = tokio::spawn({
        let slot = Arc::clone(&slot);
        async move {
            tokio::time::sleep(bound).await;
            if slot.complete(RaceOutcome::TimedOut) {
                tracing::debug!(
                    bound_secs = bound.as_secs(),
                    "deadline fired before native completion"
                );
            }
        }
    });

    // The slot holds the sender until a writer claims it, and the deadline
    // task keeps the slot alive, so the channel cannot close without an
    // outcome.
    let outcome = rx.await.unwrap_or(RaceOutcome::TimedOut);
    deadline.abort();
    outcome
}
