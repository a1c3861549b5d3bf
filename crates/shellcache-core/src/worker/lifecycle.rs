use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::debug;

use crate::error::WorkerError;

/// Registration state of the background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Failed or replaced; never serves again
    Redundant,
}

impl WorkerState {
    fn can_become(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Activating, Redundant)
                | (Activated, Redundant)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Lifecycle state plus the activate-immediately flag set by install or by
/// a page request.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(WorkerState::Parsed);
        Self {
            state,
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn transition(&self, next: WorkerState) -> Result<(), WorkerError> {
        let mut refused = None;
        self.state.send_if_modified(|current| {
            if current.can_become(next) {
                debug!(from = %current, to = %next, "Worker state changed");
                *current = next;
                true
            } else {
                refused = Some(*current);
                false
            }
        });
        match refused {
            Some(from) => Err(WorkerError::InvalidTransition {
                from: from.to_string(),
                to: next.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Activate as soon as installed, without waiting for old pages to close.
    pub fn request_skip_waiting(&self) {
        if !self.skip_waiting.swap(true, Ordering::SeqCst) {
            debug!("Skip waiting requested");
        }
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}
