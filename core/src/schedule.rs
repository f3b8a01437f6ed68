//! Deferred delivery onto the host task queue.

use tokio::task;

/// Queue `job` to run on a later turn of the current `LocalSet`.
///
/// Tasks queued from the same turn run in the order they were queued.
///
/// # Panics
///
/// Panics when called outside a tokio `LocalSet`.
pub(crate) fn defer(job: impl FnOnce() + 'static) {
    drop(task::spawn_local(async move { job() }));
}
