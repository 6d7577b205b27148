use log::{debug, warn};
use uuid::Uuid;

use crate::event::DownloadProgressEvent;

/// Per-download accumulator that mints well-formed progress events.
///
/// Producers call [`advance`](Self::advance) for every chunk of bytes and
/// [`finish`](Self::finish) when the transfer ends. `finish` takes the
/// tracker by value, so a sequence can only ever contain one `done` event and
/// nothing can follow it.
pub struct ProgressTracker {
    id: Uuid,
    url: String,
    total: Option<u64>,
    received: u64,
}

impl ProgressTracker {
    /// Tracker for a download of unknown size.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let id = Uuid::new_v4();
        debug!("tracker {} created for {}", id, url);
        Self {
            id,
            url,
            total: None,
            received: 0,
        }
    }

    /// Tracker for a download whose size is known up front.
    pub fn with_total(url: impl Into<String>, total: u64) -> Self {
        let mut tracker = Self::new(url);
        tracker.total = Some(total);
        tracker
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Record the total size once it becomes known (e.g. from a
    /// Content-Length header that arrived after the tracker was created).
    /// A total that is already set stays put.
    pub fn set_total(&mut self, total: u64) {
        if self.total.is_none() {
            self.total = Some(total);
        }
    }

    /// Record `delta` freshly received bytes and build the matching event.
    ///
    /// When the total is known, a delta that would push `received` past it is
    /// clamped so the emitted sequence stays valid.
    pub fn advance(&mut self, delta: u64) -> DownloadProgressEvent {
        let delta = match self.total {
            Some(total) => {
                let remaining = total.saturating_sub(self.received);
                if delta > remaining {
                    warn!(
                        "tracker {}: delta {} exceeds remaining {} bytes, clamping",
                        self.id, delta, remaining
                    );
                    remaining
                } else {
                    delta
                }
            }
            None => delta,
        };

        let before = self.received;
        self.received = before.saturating_add(delta);
        // Keep the emitted delta equal to what was actually recorded, even
        // when the accumulator saturates.
        let delta = self.received - before;
        DownloadProgressEvent {
            url: self.url.clone(),
            total: self.total,
            received: self.received,
            delta,
            done: false,
        }
    }

    /// Consume the tracker and emit the single final event.
    ///
    /// Finishing short of a known total produces an event that downstream
    /// validators will reject; a truncated transfer should be reported as an
    /// error instead of finished.
    pub fn finish(self) -> DownloadProgressEvent {
        if let Some(total) = self.total {
            if self.received < total {
                warn!(
                    "tracker {}: finished at {} of {} bytes",
                    self.id, self.received, total
                );
            }
        }
        debug!(
            "tracker {} finished: {} bytes for {}",
            self.id, self.received, self.url
        );
        DownloadProgressEvent {
            url: self.url,
            total: self.total,
            received: self.received,
            delta: 0,
            done: true,
        }
    }
}
