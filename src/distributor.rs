//! Frame fan-out: delivers each frame blob to every currently-registered
//! consumer exactly once, in registration order.
//!
//! `add`, `remove`, and `distribute` are mutually exclusive via a single
//! lock; a `distribute` call sees a consistent snapshot of consumers, never
//! a torn iteration. A consumer that panics is caught and logged — it never
//! prevents delivery to the remaining consumers, and never propagates out of
//! `distribute`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// A frame consumer: any closure that accepts a shared view of a frame.
pub type Consumer = Arc<dyn Fn(&[u8]) + Send + Sync>;

struct ConsumerEntry {
    id: usize,
    f: Consumer,
}

/// Fan-out point for one input source. Cheap to clone (internally `Arc`'d by
/// callers that need to share it); the distributor itself owns its consumer
/// list behind a `parking_lot::Mutex`.
#[derive(Default)]
pub struct FrameDistributor {
    consumers: Mutex<Vec<ConsumerEntry>>,
}

impl FrameDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer. Returns a token that can later be passed to
    /// [`FrameDistributor::remove_consumer`]. Adding the exact same `Arc`
    /// pointer twice is a no-op.
    pub fn add_consumer(&self, consumer_fn: Consumer) -> usize {
        let mut guard = self.consumers.lock();
        if let Some(existing) = guard
            .iter()
            .find(|e| Arc::ptr_eq(&e.f, &consumer_fn))
        {
            return existing.id;
        }
        let id = guard.last().map(|e| e.id + 1).unwrap_or(0);
        guard.push(ConsumerEntry { id, f: consumer_fn });
        id
    }

    /// Deregister a consumer by the token returned from `add_consumer`.
    /// Removing an unknown token is a no-op.
    pub fn remove_consumer(&self, id: usize) {
        let mut guard = self.consumers.lock();
        guard.retain(|e| e.id != id);
    }

    /// Deliver `frame` to every currently-registered consumer.
    ///
    /// The consumer snapshot is taken under the lock, then each consumer is
    /// invoked; a panicking consumer is caught so the rest still run.
    /// Consumers must not call back into this distributor (re-entrancy would
    /// deadlock on `add_consumer`/`remove_consumer`, which take the same
    /// lock `distribute` holds while snapshotting).
    pub fn distribute(&self, frame: &[u8]) {
        let snapshot: Vec<Consumer> = {
            let guard = self.consumers.lock();
            guard.iter().map(|e| e.f.clone()).collect()
        };
        for consumer in snapshot {
            let result = panic::catch_unwind(AssertUnwindSafe(|| consumer(frame)));
            if let Err(e) = result {
                let msg = e
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| e.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".into());
                warn!(error = %msg, "frame consumer panicked, continuing with remaining consumers");
            }
        }
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }
}
