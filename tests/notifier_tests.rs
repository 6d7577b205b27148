use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use dlprogress::{
    DownloadProgressEvent, ProgressNotifier, ProgressObserver, ProgressSnapshot, ProgressTracker,
    WatchObserver,
};

/// Observer that records everything it is told, for later assertions.
#[derive(Clone, Default)]
struct RecordingObserver {
    snapshots: Arc<Mutex<Vec<ProgressSnapshot>>>,
    completions: Arc<Mutex<Vec<ProgressSnapshot>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ProgressObserver for RecordingObserver {
    async fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    async fn on_complete(&self, snapshot: &ProgressSnapshot) {
        self.completions.lock().unwrap().push(snapshot.clone());
    }

    async fn on_error(&self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

/// Helper: notifier with a recording observer attached, plus the recorder.
fn recording_notifier() -> (ProgressNotifier, RecordingObserver) {
    let recorder = RecordingObserver::default();
    let mut notifier = ProgressNotifier::new();
    notifier.add_observer(Box::new(recorder.clone()));
    (notifier, recorder)
}

// ---------------------------------------------------------------
// happy path
// ---------------------------------------------------------------

#[tokio::test]
async fn test_single_download_completes() {
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut tracker = ProgressTracker::with_total("https://example.com/a.bin", 300);
    tx.send(Ok(tracker.advance(100))).await.unwrap();
    tx.send(Ok(tracker.advance(200))).await.unwrap();
    tx.send(Ok(tracker.finish())).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    assert_eq!(recorder.snapshots.lock().unwrap().len(), 3);
    assert!(recorder.errors.lock().unwrap().is_empty());

    let completions = recorder.completions.lock().unwrap();
    assert_eq!(completions.len(), 1);
    let final_snapshot = &completions[0];
    assert!(final_snapshot.done);
    assert_eq!(final_snapshot.total_received, 300);
    assert_eq!(final_snapshot.total_bytes, 300);
    assert_eq!(final_snapshot.eta_secs, 0.0);
    assert_eq!(final_snapshot.downloads.len(), 1);
    assert!(final_snapshot.downloads[0].done);
}

#[tokio::test]
async fn test_snapshots_accumulate_in_order() {
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut tracker = ProgressTracker::new("https://example.com/a.bin");
    tx.send(Ok(tracker.advance(100))).await.unwrap();
    tx.send(Ok(tracker.advance(150))).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    let snapshots = recorder.snapshots.lock().unwrap();
    let received: Vec<u64> = snapshots.iter().map(|s| s.total_received).collect();
    assert_eq!(received, vec![100, 250]);
}

#[tokio::test]
async fn test_first_event_reports_zero_speed() {
    // The first event for a download carries no timing baseline yet, so its
    // snapshot must not invent a transfer rate from the entry-creation
    // instant.
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut tracker = ProgressTracker::with_total("https://example.com/a.bin", 400);
    tx.send(Ok(tracker.advance(100))).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    let snapshots = recorder.snapshots.lock().unwrap();
    let first = &snapshots[0];
    assert_eq!(first.speed, 0.0);
    assert_eq!(first.eta_secs, 0.0);
    assert_eq!(first.downloads[0].speed, 0.0);
    assert_eq!(first.downloads[0].eta_secs, 0.0);
}

#[tokio::test]
async fn test_two_downloads_aggregate() {
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut a = ProgressTracker::with_total("https://example.com/a.bin", 100);
    let mut b = ProgressTracker::with_total("https://example.com/b.bin", 200);

    tx.send(Ok(a.advance(40))).await.unwrap();
    tx.send(Ok(b.advance(120))).await.unwrap();
    tx.send(Ok(a.advance(60))).await.unwrap();
    tx.send(Ok(a.finish())).await.unwrap();
    tx.send(Ok(b.advance(80))).await.unwrap();
    tx.send(Ok(b.finish())).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    let completions = recorder.completions.lock().unwrap();
    let final_snapshot = &completions[0];
    assert_eq!(final_snapshot.downloads.len(), 2);
    assert_eq!(final_snapshot.total_received, 300);
    assert_eq!(final_snapshot.total_bytes, 300);

    // Insertion order is stable.
    assert_eq!(final_snapshot.downloads[0].url, "https://example.com/a.bin");
    assert_eq!(final_snapshot.downloads[1].url, "https://example.com/b.bin");
    assert_eq!(final_snapshot.downloads[0].received, 100);
    assert_eq!(final_snapshot.downloads[1].received, 200);
}

#[tokio::test]
async fn test_clean_close_without_done_still_completes() {
    // A producer that drops its sender without a final event: completion is
    // reported anyway (with a warning in the logs).
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut tracker = ProgressTracker::new("https://example.com/a.bin");
    tx.send(Ok(tracker.advance(100))).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    assert_eq!(recorder.completions.lock().unwrap().len(), 1);
    assert!(recorder.errors.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------
// error path
// ---------------------------------------------------------------

#[tokio::test]
async fn test_channel_error_reaches_observers() {
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut tracker = ProgressTracker::new("https://example.com/a.bin");
    tx.send(Ok(tracker.advance(100))).await.unwrap();
    tx.send(Err("connection reset".to_string())).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    let errors = recorder.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0], "connection reset");
    assert!(recorder.completions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_sequence_is_treated_as_error() {
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let good = DownloadProgressEvent {
        url: "https://example.com/a.bin".to_string(),
        total: None,
        received: 100,
        delta: 100,
        done: false,
    };
    let bad = DownloadProgressEvent {
        received: 90,
        delta: 0,
        ..good.clone()
    };
    tx.send(Ok(good)).await.unwrap();
    tx.send(Ok(bad)).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    let errors = recorder.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("went backwards"));
    // The bad event produced no snapshot and no completion.
    assert_eq!(recorder.snapshots.lock().unwrap().len(), 1);
    assert!(recorder.completions.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------
// raw-event callbacks
// ---------------------------------------------------------------

#[tokio::test]
async fn test_callbacks_see_every_event_in_order() {
    let seen: Arc<Mutex<Vec<DownloadProgressEvent>>> = Arc::default();
    let sink = Arc::clone(&seen);

    let (mut notifier, _recorder) = recording_notifier();
    // A plain unit-returning closure is a valid callback; nothing consults
    // its return value.
    notifier.add_callback(Box::new(move |ev| {
        sink.lock().unwrap().push(ev.clone());
    }));

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut tracker = ProgressTracker::with_total("https://example.com/a.bin", 200);
    let sent = vec![tracker.advance(80), tracker.advance(120), tracker.finish()];
    for ev in &sent {
        tx.send(Ok(ev.clone())).await.unwrap();
    }
    drop(tx);

    handle.await.unwrap();

    assert_eq!(*seen.lock().unwrap(), sent);
}

// ---------------------------------------------------------------
// watch observer
// ---------------------------------------------------------------

#[tokio::test]
async fn test_watch_observer_pushes_snapshots() {
    let (watch_observer, rx) = WatchObserver::new();
    let mut notifier = ProgressNotifier::new();
    notifier.add_observer(Box::new(watch_observer));

    let (tx, progress_rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(progress_rx));

    let mut tracker = ProgressTracker::with_total("https://example.com/a.bin", 100);
    tx.send(Ok(tracker.advance(100))).await.unwrap();
    tx.send(Ok(tracker.finish())).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    // The receiver holds the final snapshot.
    let snapshot = rx.borrow().clone();
    assert!(snapshot.done);
    assert_eq!(snapshot.total_received, 100);
    assert_eq!(snapshot.to_json()["total_bytes"], 100);
}

// ---------------------------------------------------------------
// snapshot serialization
// ---------------------------------------------------------------

#[tokio::test]
async fn test_final_snapshot_serializes_to_json() {
    let (notifier, recorder) = recording_notifier();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(notifier.run(rx));

    let mut tracker = ProgressTracker::with_total("https://example.com/a.bin", 100);
    tx.send(Ok(tracker.advance(100))).await.unwrap();
    tx.send(Ok(tracker.finish())).await.unwrap();
    drop(tx);

    handle.await.unwrap();

    let completions = recorder.completions.lock().unwrap();
    let json = serde_json::to_value(&completions[0]).unwrap();
    assert_eq!(json["done"], true);
    assert_eq!(json["total_received"], 100);
    assert_eq!(json["downloads"][0]["url"], "https://example.com/a.bin");
    assert_eq!(json["downloads"][0]["total"], 100);
}
