use std::collections::HashMap;
use std::time::Instant;

use log::warn;
use tokio::sync::mpsc;

use crate::event::{DownloadProgressEvent, ProgressCallback};
use crate::observer::ProgressObserver;
use crate::sequence::{SequenceError, SequenceValidator};
use crate::snapshot::{DownloadSnapshot, ProgressSnapshot};

/// EMA smoothing factor. 0.3 = responsive but stable.
const EMA_ALPHA: f64 = 0.3;

/// Internal per-download tracking (purely data, no UI).
struct DownloadProgress {
    url: String,
    received: u64,
    total: Option<u64>,
    speed: f64,
    last_update: Instant,
    done: bool,
    validator: SequenceValidator,
}

/// Consumes `Result<DownloadProgressEvent, String>` from the progress
/// channel, fans raw events out to registered callbacks, aggregates them into
/// `ProgressSnapshot`s, and fans those out to all registered observers.
///
/// Events are validated against the sequence invariants as they arrive; a
/// violating event is treated like an `Err` on the channel.
///
/// # Lifecycle
///
/// | Channel message         | What happens                              |
/// |-------------------------|-------------------------------------------|
/// | `Ok(event)`, valid      | callbacks(&event), `on_progress(&snapshot)` |
/// | `Ok(event)`, invalid    | `on_error(&msg)` then stops               |
/// | `Err(String)`           | `on_error(&msg)` then stops               |
/// | Channel closed (no err) | `on_complete(&final_snapshot)`            |
///
/// Downloads are keyed by `url`: two concurrent downloads of the same url
/// feed one logical entry and must jointly satisfy the sequence invariants.
pub struct ProgressNotifier {
    observers: Vec<Box<dyn ProgressObserver>>,
    callbacks: Vec<ProgressCallback>,
    downloads: HashMap<String, DownloadProgress>,
    download_order: Vec<String>,
    start_time: Instant,
}

impl ProgressNotifier {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            callbacks: Vec::new(),
            downloads: HashMap::new(),
            download_order: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Register an observer. Must be called before `run()`.
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    /// Register a raw-event callback. Must be called before `run()`.
    ///
    /// Callbacks see every valid event exactly as the producer built it,
    /// before any aggregation. Their return value is ignored.
    pub fn add_callback(&mut self, callback: ProgressCallback) {
        self.callbacks.push(callback);
    }

    /// Consume progress messages until the channel closes or an error
    /// arrives.
    pub async fn run(
        mut self,
        mut progress_rx: mpsc::Receiver<Result<DownloadProgressEvent, String>>,
    ) {
        while let Some(msg) = progress_rx.recv().await {
            match msg {
                Ok(ev) => {
                    let now = Instant::now();
                    if let Err(seq_err) = self.validate(&ev, now) {
                        let error = seq_err.to_string();
                        for observer in &self.observers {
                            observer.on_error(&error).await;
                        }
                        return;
                    }
                    for callback in &self.callbacks {
                        callback(&ev);
                    }
                    let snapshot = self.handle_event(ev, now);
                    for observer in &self.observers {
                        observer.on_progress(&snapshot).await;
                    }
                }
                Err(error) => {
                    for observer in &self.observers {
                        observer.on_error(&error).await;
                    }
                    return; // stop processing after error
                }
            }
        }
        // Channel closed cleanly — all senders dropped, no error received
        self.finish().await;
    }

    /// Run the event through its download's sequence validator, creating the
    /// tracking entry on first sight.
    ///
    /// `now` is the event's arrival time; `handle_event` computes elapsed
    /// time against the same instant, so a freshly created entry sees
    /// `elapsed == 0.0` and its speed stays at 0 until the second event.
    fn validate(&mut self, ev: &DownloadProgressEvent, now: Instant) -> Result<(), SequenceError> {
        // Lazy init: track new url on first sight
        if !self.downloads.contains_key(&ev.url) {
            self.download_order.push(ev.url.clone());
            self.downloads.insert(
                ev.url.clone(),
                DownloadProgress {
                    url: ev.url.clone(),
                    received: 0,
                    total: None,
                    speed: 0.0,
                    last_update: now,
                    done: false,
                    validator: SequenceValidator::new(),
                },
            );
        }
        let download = self.downloads.get_mut(&ev.url).unwrap();
        download.validator.observe(ev)
    }

    /// Fold a validated event into the aggregation state and return the
    /// updated snapshot.
    fn handle_event(&mut self, ev: DownloadProgressEvent, now: Instant) -> ProgressSnapshot {
        {
            // Entry exists: validate() created it.
            let download = self.downloads.get_mut(&ev.url).unwrap();
            download.received = ev.received;
            if download.total.is_none() {
                download.total = ev.total;
            }
            download.done = ev.done;

            // Compute EMA speed
            let elapsed = now.duration_since(download.last_update).as_secs_f64();
            if elapsed > 0.0 {
                let instant_speed = ev.delta as f64 / elapsed;
                download.speed = EMA_ALPHA * instant_speed + (1.0 - EMA_ALPHA) * download.speed;
                download.last_update = now;
            }
        }

        self.build_snapshot()
    }

    /// Build a `ProgressSnapshot` from current aggregation state.
    fn build_snapshot(&self) -> ProgressSnapshot {
        let total_bytes: u64 = self
            .downloads
            .values()
            .filter_map(|d| d.total)
            .sum();
        let total_received: u64 = self.downloads.values().map(|d| d.received).sum();
        let combined_speed: f64 = self.downloads.values().map(|d| d.speed).sum();
        let remaining = total_bytes.saturating_sub(total_received);
        let eta = if combined_speed > 0.0 {
            remaining as f64 / combined_speed
        } else {
            0.0
        };

        let download_snapshots: Vec<DownloadSnapshot> = self
            .download_order
            .iter()
            .filter_map(|url| self.downloads.get(url))
            .map(|d| {
                let rem = d.total.map(|t| t.saturating_sub(d.received)).unwrap_or(0);
                let download_eta = if d.speed > 0.0 {
                    rem as f64 / d.speed
                } else {
                    0.0
                };
                DownloadSnapshot {
                    url: d.url.clone(),
                    received: d.received,
                    total: d.total,
                    speed: d.speed,
                    eta_secs: download_eta,
                    done: d.done,
                }
            })
            .collect();

        ProgressSnapshot {
            downloads: download_snapshots,
            total_received,
            total_bytes,
            speed: combined_speed,
            eta_secs: eta,
            done: false,
        }
    }

    /// Finalize: build final snapshot with `done = true`, notify observers.
    async fn finish(self) {
        for download in self.downloads.values() {
            if download.validator.finish().is_err() {
                warn!(
                    "progress channel closed but {} never sent a final event",
                    download.url
                );
            }
        }

        let elapsed = self.start_time.elapsed();
        let total_received: u64 = self.downloads.values().map(|d| d.received).sum();
        let avg_speed = if elapsed.as_secs_f64() > 0.0 {
            total_received as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let mut final_snapshot = self.build_snapshot();
        final_snapshot.done = true;
        final_snapshot.speed = avg_speed;
        final_snapshot.eta_secs = 0.0;

        for observer in &self.observers {
            observer.on_complete(&final_snapshot).await;
        }
    }
}

impl Default for ProgressNotifier {
    fn default() -> Self {
        Self::new()
    }
}
