use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::observer::ProgressObserver;
use crate::snapshot::{format_bytes, ProgressSnapshot};

/// Renders download progress as indicatif terminal bars.
///
/// One `ProgressBar` is created per download, plus a total bar.
/// All bars live under a shared `MultiProgress` so they render cleanly.
pub struct TerminalObserver {
    multi: MultiProgress,
    /// url → ProgressBar (lazily initialised on first `on_progress` call)
    bars: Mutex<HashMap<String, ProgressBar>>,
    /// The aggregate total bar
    total_bar: Mutex<Option<ProgressBar>>,
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            total_bar: Mutex::new(None),
        }
    }

    /// Ensure all per-download bars and the total bar exist for the snapshot.
    fn ensure_bars(&self, snapshot: &ProgressSnapshot) {
        let mut bars = self.bars.lock().unwrap();
        let mut total_bar = self.total_bar.lock().unwrap();

        // Per-download bars
        for download in &snapshot.downloads {
            if !bars.contains_key(&download.url) {
                let style = ProgressStyle::with_template(
                    "[{bar:30.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) ETA {eta} — {msg}",
                )
                .unwrap()
                .progress_chars("=>-");

                let len = download.total.unwrap_or(0).max(1);
                let pb = self.multi.add(ProgressBar::new(len));
                pb.set_style(style);
                pb.set_message(download.url.clone());
                bars.insert(download.url.clone(), pb);
            }
        }

        // Total bar (created once)
        if total_bar.is_none() && snapshot.total_bytes > 0 {
            let style = ProgressStyle::with_template(
                "Total [{bar:30.green/white}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) ETA {eta}",
            )
            .unwrap()
            .progress_chars("=>-");

            let pb = self.multi.add(ProgressBar::new(snapshot.total_bytes.max(1)));
            pb.set_style(style);
            *total_bar = Some(pb);
        }
    }

    fn update_bars(&self, snapshot: &ProgressSnapshot) {
        let bars = self.bars.lock().unwrap();
        let total_bar = self.total_bar.lock().unwrap();

        for download in &snapshot.downloads {
            if let Some(pb) = bars.get(&download.url) {
                pb.set_length(download.total.unwrap_or(download.received).max(1));
                pb.set_position(download.received);
            }
        }

        if let Some(pb) = total_bar.as_ref() {
            pb.set_length(snapshot.total_bytes.max(1));
            pb.set_position(snapshot.total_received);
        }
    }

    fn finish_bars(&self, snapshot: &ProgressSnapshot) {
        let bars = self.bars.lock().unwrap();
        let total_bar = self.total_bar.lock().unwrap();

        for download in &snapshot.downloads {
            if let Some(pb) = bars.get(&download.url) {
                pb.finish_with_message(format!("{} done", download.url));
            }
        }

        if let Some(pb) = total_bar.as_ref() {
            let speed = format_bytes(snapshot.speed as u64);
            let total = format_bytes(snapshot.total_received);
            pb.finish_with_message(format!("Complete — {} at {}/s", total, speed));
        }
    }
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressObserver for TerminalObserver {
    async fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.ensure_bars(snapshot);
        self.update_bars(snapshot);
    }

    async fn on_complete(&self, snapshot: &ProgressSnapshot) {
        self.ensure_bars(snapshot);
        self.finish_bars(snapshot);
    }

    async fn on_error(&self, error: &str) {
        // Abandon all open bars with the error message.
        let bars = self.bars.lock().unwrap();
        let total_bar = self.total_bar.lock().unwrap();

        for pb in bars.values() {
            pb.abandon_with_message(format!("Error: {}", error));
        }
        if let Some(pb) = total_bar.as_ref() {
            pb.abandon_with_message(format!("Failed: {}", error));
        }
    }
}
