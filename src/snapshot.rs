use serde::Serialize;

/// Per-download progress snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSnapshot {
    pub url: String,
    pub received: u64,
    pub total: Option<u64>,
    pub speed: f64,
    pub eta_secs: f64,
    pub done: bool,
}

/// Aggregate progress snapshot across all tracked downloads.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub downloads: Vec<DownloadSnapshot>,
    pub total_received: u64,
    /// Sum of the known totals. Downloads of unknown size contribute nothing.
    pub total_bytes: u64,
    pub speed: f64,
    pub eta_secs: f64,
    pub done: bool,
}

impl ProgressSnapshot {
    /// JSON rendering for HTTP/SSE consumers.
    pub fn to_json(&self) -> serde_json::Value {
        // Serialize derives guarantee this cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn empty() -> Self {
        Self {
            downloads: Vec::new(),
            total_received: 0,
            total_bytes: 0,
            speed: 0.0,
            eta_secs: 0.0,
            done: false,
        }
    }
}

/// Human-readable byte formatting.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
