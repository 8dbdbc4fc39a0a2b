//! Structured event sink for namespace diagnostics.
//!
//! Nodes never log inline. They report what happened to an [`FsEvents`]
//! implementation at fixed points (population, refresh, open), and the sink
//! decides what to do with it.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Something observable that happened inside the namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FsEvent {
    /// A directory began querying the graph for its entries.
    PopulateStarted { path: String },
    /// A directory committed its entries.
    Populated { path: String, entries: usize },
    /// A directory's query failed. The directory stays retryable.
    PopulateFailed { path: String, error: String },
    /// A directory entry was left out of a listing.
    EntrySkipped {
        path: String,
        name: String,
        reason: String,
    },
    /// The roots listing began re-querying the graph.
    RefreshStarted,
    /// The roots listing was replaced.
    Refreshed { roots: usize, evicted: Vec<String> },
    /// The roots refresh failed. The previous listing is kept.
    RefreshFailed { error: String },
    /// A file version could not be opened for reading.
    OpenFailed { path: String, error: String },
}

/// Receives namespace events.
pub trait FsEvents: Send + Sync {
    fn emit(&self, event: &FsEvent);
}

/// Forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEvents;

impl FsEvents for TracingEvents {
    fn emit(&self, event: &FsEvent) {
        match event {
            FsEvent::PopulateStarted { path } => debug!(path = %path, "populating directory"),
            FsEvent::Populated { path, entries } => {
                debug!(path = %path, entries, "directory populated")
            }
            FsEvent::PopulateFailed { path, error } => {
                warn!(path = %path, error = %error, "directory population failed")
            }
            FsEvent::EntrySkipped { path, name, reason } => {
                debug!(path = %path, name = %name, reason = %reason, "entry skipped")
            }
            FsEvent::RefreshStarted => debug!("refreshing roots"),
            FsEvent::Refreshed { roots, evicted } => {
                if evicted.is_empty() {
                    debug!(roots, "roots refreshed");
                } else {
                    info!(roots, evicted = ?evicted, "roots refreshed with evictions");
                }
            }
            FsEvent::RefreshFailed { error } => warn!(error = %error, "roots refresh failed"),
            FsEvent::OpenFailed { path, error } => {
                warn!(path = %path, error = %error, "open failed")
            }
        }
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvents;

impl FsEvents for NoopEvents {
    fn emit(&self, _event: &FsEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<FsEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<FsEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&FsEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl FsEvents for RecordingEvents {
    fn emit(&self, event: &FsEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingEvents::new();
        sink.emit(&FsEvent::RefreshStarted);
        sink.emit(&FsEvent::Refreshed {
            roots: 2,
            evicted: vec![],
        });
        assert_eq!(
            sink.events(),
            vec![
                FsEvent::RefreshStarted,
                FsEvent::Refreshed {
                    roots: 2,
                    evicted: vec![]
                }
            ]
        );
        assert_eq!(sink.count(|e| matches!(e, FsEvent::RefreshStarted)), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn tracing_and_noop_sinks_accept_every_event() {
        let events = [
            FsEvent::PopulateStarted { path: "/a".into() },
            FsEvent::Populated {
                path: "/a".into(),
                entries: 1,
            },
            FsEvent::PopulateFailed {
                path: "/a".into(),
                error: "down".into(),
            },
            FsEvent::EntrySkipped {
                path: "/a".into(),
                name: "x".into(),
                reason: "unknown type".into(),
            },
            FsEvent::RefreshStarted,
            FsEvent::Refreshed {
                roots: 0,
                evicted: vec!["photos".into()],
            },
            FsEvent::RefreshFailed {
                error: "down".into(),
            },
            FsEvent::OpenFailed {
                path: "/a/b".into(),
                error: "gone".into(),
            },
        ];
        for event in &events {
            TracingEvents.emit(event);
            NoopEvents.emit(event);
        }
    }
}
