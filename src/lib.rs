pub mod event;
pub mod notifier;
pub mod observer;
pub mod sequence;
pub mod snapshot;
pub mod terminal;
pub mod tracker;
pub mod watch;

pub use event::{DownloadProgressEvent, ProgressCallback};
pub use notifier::ProgressNotifier;
pub use observer::ProgressObserver;
pub use sequence::{validate_sequence, SequenceError, SequenceValidator};
pub use snapshot::{format_bytes, DownloadSnapshot, ProgressSnapshot};
pub use terminal::TerminalObserver;
pub use tracker::ProgressTracker;
pub use watch::WatchObserver;
