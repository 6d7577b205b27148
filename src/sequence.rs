use thiserror::Error;

use crate::event::DownloadProgressEvent;

/// Violation of the progress-sequence invariants for one download.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequenceError {
    #[error("received count went backwards: {prev} -> {next}")]
    ReceivedDecreased { prev: u64, next: u64 },

    #[error("delta {delta} does not match received difference {expected}")]
    DeltaMismatch { delta: u64, expected: u64 },

    #[error("received {received} exceeds total {total}")]
    ReceivedExceedsTotal { received: u64, total: u64 },

    #[error("total changed from {prev} to {next}")]
    TotalChanged { prev: u64, next: u64 },

    #[error("final event reports {received} of {total} bytes")]
    DoneBeforeTotal { received: u64, total: u64 },

    #[error("event arrived after the final event")]
    EventAfterDone,

    #[error("sequence ended without a final event")]
    MissingDone,

    #[error("event url {got:?} does not match sequence url {expected:?}")]
    UrlMismatch { expected: String, got: String },
}

/// Incremental checker for one download's event sequence.
///
/// Feed every event to [`observe`](Self::observe) in delivery order, then call
/// [`finish`](Self::finish) once the producer is gone. The first violation is
/// reported; the validator is not usable for the same sequence afterwards.
///
/// The checks mirror the event invariants: `received` never decreases and
/// always equals the previous `received` plus the event's `delta` (the first
/// event's `received` equals its own `delta`), a known `total` never changes
/// and is never exceeded, and exactly one `done` event closes the sequence.
#[derive(Debug, Default)]
pub struct SequenceValidator {
    url: Option<String>,
    total: Option<u64>,
    received: u64,
    done_seen: bool,
}

impl SequenceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the next event against the sequence so far.
    pub fn observe(&mut self, ev: &DownloadProgressEvent) -> Result<(), SequenceError> {
        if self.done_seen {
            return Err(SequenceError::EventAfterDone);
        }

        // The url is pinned by the first event.
        match &self.url {
            None => self.url = Some(ev.url.clone()),
            Some(url) if *url != ev.url => {
                return Err(SequenceError::UrlMismatch {
                    expected: url.clone(),
                    got: ev.url.clone(),
                });
            }
            Some(_) => {}
        }

        if ev.received < self.received {
            return Err(SequenceError::ReceivedDecreased {
                prev: self.received,
                next: ev.received,
            });
        }

        let expected = ev.received - self.received;
        if ev.delta != expected {
            return Err(SequenceError::DeltaMismatch {
                delta: ev.delta,
                expected,
            });
        }

        // Unknown -> known is fine; a known total must stay put.
        match (self.total, ev.total) {
            (Some(prev), Some(next)) if prev != next => {
                return Err(SequenceError::TotalChanged { prev, next });
            }
            (None, Some(next)) => self.total = Some(next),
            _ => {}
        }

        if let Some(total) = self.total {
            if ev.received > total {
                return Err(SequenceError::ReceivedExceedsTotal {
                    received: ev.received,
                    total,
                });
            }
            if ev.done && ev.received != total {
                return Err(SequenceError::DoneBeforeTotal {
                    received: ev.received,
                    total,
                });
            }
        }

        self.received = ev.received;
        if ev.done {
            self.done_seen = true;
        }
        Ok(())
    }

    /// Check that the sequence was closed by a `done` event.
    pub fn finish(&self) -> Result<(), SequenceError> {
        if self.done_seen {
            Ok(())
        } else {
            Err(SequenceError::MissingDone)
        }
    }

    /// Whether the final event has already been observed.
    pub fn is_done(&self) -> bool {
        self.done_seen
    }
}

/// Validate a complete event sequence in one shot.
pub fn validate_sequence<'a, I>(events: I) -> Result<(), SequenceError>
where
    I: IntoIterator<Item = &'a DownloadProgressEvent>,
{
    let mut validator = SequenceValidator::new();
    for ev in events {
        validator.observe(ev)?;
    }
    validator.finish()
}
