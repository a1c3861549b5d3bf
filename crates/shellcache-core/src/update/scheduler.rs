use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::host::Navigator;

use super::orchestrator::{was_just_updated, without_update_params};
use super::{CheckOutcome, VersionPoller};

/// Runs version checks shortly after startup and whenever the page regains
/// focus.
pub struct UpdateScheduler {
    poller: Arc<VersionPoller>,
    navigator: Arc<dyn Navigator>,
    initial_delay: Duration,
}

impl UpdateScheduler {
    pub fn new(poller: Arc<VersionPoller>, navigator: Arc<dyn Navigator>, initial_delay: Duration) -> Self {
        Self {
            poller,
            navigator,
            initial_delay,
        }
    }

    /// Run until the focus channel closes.
    pub fn spawn(self, focus: mpsc::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(focus))
    }

    pub async fn run(self, mut focus: mpsc::Receiver<()>) {
        let location = self.navigator.location();
        let just_updated = was_just_updated(&location);
        if just_updated {
            info!("Started right after an update, skipping startup check");
            let clean = without_update_params(&location);
            if let Err(e) = self.navigator.replace(&clean).await {
                warn!(error = %e, "Failed to clean update markers from location");
            }
        }

        let startup = tokio::time::sleep(self.initial_delay);
        tokio::pin!(startup);
        let mut startup_pending = !just_updated;

        loop {
            tokio::select! {
                () = &mut startup, if startup_pending => {
                    startup_pending = false;
                    self.check("startup").await;
                }
                event = focus.recv() => match event {
                    Some(()) => self.check("focus").await,
                    None => break,
                },
            }
        }
        debug!("Update scheduler stopped");
    }

    /// Every trigger is throttled, including the one at startup.
    async fn check(&self, trigger: &'static str) {
        match self.poller.check_for_updates(false).await {
            Ok(CheckOutcome::Skipped(reason)) => debug!(trigger, %reason, "Check skipped"),
            Ok(CheckOutcome::UpToDate(record)) => debug!(trigger, version = %record.version, "Up to date"),
            Ok(CheckOutcome::UpdateAvailable(record)) => {
                info!(trigger, version = %record.version, "New version available")
            }
            Err(e) => warn!(trigger, error = %e, "Version check failed"),
        }
    }
}
