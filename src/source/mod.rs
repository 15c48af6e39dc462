//! Input sources: things that produce raw video frames and hand them to a
//! [`FrameDistributor`](crate::distributor::FrameDistributor).
//!
//! One trait covers both the networked-camera and locally-attached-camera
//! case. There is no base/derived split and no runtime capability probing —
//! every source implements every method, even if some are no-ops for that
//! variant.

pub mod gst_pipeline;
pub mod local;
pub mod network;

use crate::distributor::Consumer;
use crate::error::Result;

/// A thing that produces frames on a background worker and can be told to
/// start or stop producing them.
///
/// `start`/`stop` are idempotent: calling `start` while already running, or
/// `stop` while already stopped, is a no-op (logged, not an error). `stop`
/// blocks until the worker thread has actually exited, bounded by an
/// internal timeout — callers never hang waiting on a wedged pipeline.
pub trait InputSource: Send + Sync {
    /// Open the underlying device/stream and spawn the worker that reads
    /// frames from it and pushes them into this source's distributor.
    fn start(&self) -> Result<()>;

    /// Stop the worker and release pipeline resources. Safe to call
    /// multiple times.
    fn stop(&self);

    /// Register a frame consumer, returning a token for later removal.
    fn add_consumer(&self, consumer: Consumer) -> usize;

    /// Deregister a consumer previously added with `add_consumer`.
    fn remove_consumer(&self, id: usize);

    /// Whether the worker is currently running.
    fn is_active(&self) -> bool;

    /// Stable identifier used in logs and status snapshots.
    fn name(&self) -> &str;

    /// Tear down for good. The default implementation is just `stop`;
    /// sources with no extra cleanup don't need to override it.
    fn release(&self) {
        self.stop();
    }
}

/// Blocks until `handle` finishes or `timeout` elapses, whichever is first.
/// Returns `true` if the thread finished in time.
///
/// `JoinHandle::join` has no built-in timeout, so the handle is joined on a
/// watcher thread and we wait on a channel instead. If the timeout fires the
/// watcher is abandoned — it will still reap the thread eventually, just
/// without this caller waiting on it.
pub(crate) fn join_bounded(handle: std::thread::JoinHandle<()>, timeout: std::time::Duration) -> bool {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = handle.join();
        let _ = tx.send(());
    });
    rx.recv_timeout(timeout).is_ok()
}
