use async_trait::async_trait;
use tokio::sync::watch;

use crate::observer::ProgressObserver;
use crate::snapshot::ProgressSnapshot;

/// Observes download progress and pushes snapshots to a `watch` channel so
/// out-of-process consumers (SSE handlers, status endpoints) can receive
/// them via `rx.changed().await`.
///
/// Multiple consumers can each hold a clone of the `watch::Receiver` and
/// receive every update in true push fashion, no polling required.
pub struct WatchObserver {
    tx: watch::Sender<ProgressSnapshot>,
}

impl WatchObserver {
    /// Creates a new observer and returns both the observer (to be registered
    /// with `ProgressNotifier`) and a `watch::Receiver` that can be cloned
    /// and handed to consumer tasks.
    pub fn new() -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot::empty());
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressObserver for WatchObserver {
    async fn on_progress(&self, snapshot: &ProgressSnapshot) {
        // send() only fails if all receivers are dropped; safe to ignore.
        let _ = self.tx.send(snapshot.clone());
    }

    async fn on_complete(&self, snapshot: &ProgressSnapshot) {
        let _ = self.tx.send(snapshot.clone());
    }

    async fn on_error(&self, error: &str) {
        let mut snap = self.tx.borrow().clone();
        snap.done = true;
        // The snapshot has no error field; mark it done so consumer streams
        // close, and log the error on this side.
        log::error!("[WatchObserver] download error: {}", error);
        let _ = self.tx.send(snap);
    }
}
