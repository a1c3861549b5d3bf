//! Version polling and update application for the foreground page.
//!
//! [`VersionPoller`] decides whether a newer build exists and
//! [`UpdateOrchestrator`] moves the page onto it. Both share one
//! [`UpdateController`] holding the [`UpdateState`]; [`UpdateScheduler`]
//! drives the poller from startup and focus events.

pub mod controller;
pub mod orchestrator;
pub mod persist;
pub mod poller;
pub mod scheduler;
pub mod state;
pub mod version;

pub use controller::UpdateController;
pub use orchestrator::{reload_url, was_just_updated, without_update_params, UpdateOrchestrator};
pub use persist::{FileLocalState, LocalState, MemoryLocalState, PersistedUpdate};
pub use poller::{CheckOutcome, VersionPoller};
pub use scheduler::UpdateScheduler;
pub use state::{CheckSkipped, UpdatePhase, UpdateState};
pub use version::{DocumentVersionSource, RemoteVersionSource, VersionRecord, VersionSource};
