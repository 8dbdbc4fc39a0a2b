//! Population lifecycle of lazily-filled directories.
//!
//! A directory's entries move through four states:
//!
//! ```text
//! Empty ──► Populating ──► Populated   (terminal)
//!   ▲           │
//!   └── Failed ◄┘                      (retry-eligible)
//! ```
//!
//! The caller that wins the transition to `Populating` runs the query with
//! the cell unlocked. Concurrent callers park on a condition variable and
//! share its outcome, so a cold directory is queried once no matter how many
//! threads hit it at the same time.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{FsError, FsResult};

/// Observable state of a [`PopulateCell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Empty,
    Populating,
    Populated,
    Failed,
}

enum Slot<T> {
    Empty,
    Populating,
    Populated(Arc<T>),
    Failed(String),
}

struct Inner<T> {
    slot: Slot<T>,
    /// Incremented each time a population attempt starts.
    attempt: u64,
}

/// Single-flight, populate-once cell.
pub struct PopulateCell<T> {
    inner: Mutex<Inner<T>>,
    settled: Condvar,
}

impl<T> PopulateCell<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slot: Slot::Empty,
                attempt: 0,
            }),
            settled: Condvar::new(),
        }
    }

    pub fn state(&self) -> Lifecycle {
        match self.inner.lock().slot {
            Slot::Empty => Lifecycle::Empty,
            Slot::Populating => Lifecycle::Populating,
            Slot::Populated(_) => Lifecycle::Populated,
            Slot::Failed(_) => Lifecycle::Failed,
        }
    }

    /// The populated value, without triggering population.
    pub fn get(&self) -> Option<Arc<T>> {
        match &self.inner.lock().slot {
            Slot::Populated(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Return the populated value, running `populate` first if no attempt
    /// has succeeded yet.
    ///
    /// Callers that arrive while another attempt is in flight wait for it.
    /// If that attempt fails they get an [`FsError::Io`] and the cell is left
    /// `Failed`, so the next call starts a fresh attempt.
    pub fn get_or_populate(&self, populate: impl FnOnce() -> FsResult<T>) -> FsResult<Arc<T>> {
        let mut inner = self.inner.lock();
        if let Slot::Populated(value) = &inner.slot {
            return Ok(Arc::clone(value));
        }
        if matches!(inner.slot, Slot::Populating) {
            let attempt = inner.attempt;
            while matches!(inner.slot, Slot::Populating) && inner.attempt == attempt {
                self.settled.wait(&mut inner);
            }
            return match &inner.slot {
                Slot::Populated(value) => Ok(Arc::clone(value)),
                Slot::Failed(reason) => Err(FsError::Io(reason.clone())),
                // A newer attempt started after ours failed.
                Slot::Empty | Slot::Populating => {
                    Err(FsError::Io("concurrent population failed".into()))
                }
            };
        }

        inner.slot = Slot::Populating;
        inner.attempt += 1;
        drop(inner);

        let mut guard = AttemptGuard {
            cell: self,
            armed: true,
        };
        let outcome = populate();
        guard.armed = false;

        let mut inner = self.inner.lock();
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                inner.slot = Slot::Populated(Arc::clone(&value));
                Ok(value)
            }
            Err(err) => {
                inner.slot = Slot::Failed(err.to_string());
                Err(err)
            }
        };
        drop(inner);
        self.settled.notify_all();
        result
    }
}

impl<T> Default for PopulateCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PopulateCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulateCell")
            .field("state", &self.state())
            .finish()
    }
}

/// Moves the cell to `Failed` if the populate closure unwinds.
struct AttemptGuard<'a, T> {
    cell: &'a PopulateCell<T>,
    armed: bool,
}

impl<T> Drop for AttemptGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.cell.inner.lock().slot = Slot::Failed("population panicked".into());
            self.cell.settled.notify_all();
        }
    }
}
