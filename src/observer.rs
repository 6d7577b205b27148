use async_trait::async_trait;

use crate::snapshot::ProgressSnapshot;

/// Trait for anything that wants to observe download progress.
///
/// The `ProgressNotifier` calls these methods on all registered observers
/// after folding raw `DownloadProgressEvent`s into a `ProgressSnapshot`.
///
/// Lifecycle:
/// - `on_progress` is called for every event (per-chunk granularity).
/// - `on_complete` is called once when the progress channel closes without an
///   error.
/// - `on_error` is called once when an `Err(String)` arrives on the channel
///   or an event violates the sequence invariants; processing stops.
#[async_trait]
pub trait ProgressObserver: Send + Sync + 'static {
    /// Called with the latest aggregated snapshot after each event.
    async fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// Called when all downloads complete successfully.
    async fn on_complete(&self, snapshot: &ProgressSnapshot);

    /// Called when a download fails.
    async fn on_error(&self, error: &str);
}
