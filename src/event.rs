use serde::{Deserialize, Serialize};

/// A single progress notification for one in-flight download.
///
/// Events are transient, immutable values: the producer builds one, hands it
/// to the callbacks/observers, and never touches it again. Over the lifetime
/// of one download the events form a sequence in which `received` is
/// non-decreasing, each `delta` is the difference between consecutive
/// `received` values, and exactly one event — the last — carries `done`.
/// `SequenceValidator` checks these invariants at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgressEvent {
    /// Resource being downloaded.
    pub url: String,
    /// Expected total size in bytes. `None` while the server has not reported
    /// one; may flip to `Some` mid-download once the size is learned.
    pub total: Option<u64>,
    /// Cumulative bytes received so far.
    pub received: u64,
    /// Bytes received since the previous event.
    pub delta: u64,
    /// True on the final event only.
    pub done: bool,
}

impl DownloadProgressEvent {
    /// Completion ratio in `[0.0, 1.0]`, or `None` when the total size is
    /// unknown or zero.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.received as f64 / total as f64),
            _ => None,
        }
    }
}

/// Fire-and-forget progress callback.
///
/// Invoked once per event; the return value is never consulted, so a callback
/// cannot signal cancellation or back-pressure. Error reporting happens out
/// of band through `ProgressObserver::on_error`.
pub type ProgressCallback = Box<dyn Fn(&DownloadProgressEvent) + Send + Sync>;
