use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{FetchError, UpdateError};

use super::{persist, CheckSkipped, LocalState, UpdateController, VersionRecord, VersionSource};

/// Result of one call to [`VersionPoller::check_for_updates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Skipped(CheckSkipped),
    UpToDate(VersionRecord),
    UpdateAvailable(VersionRecord),
}

/// Asks the version sources whether a newer build exists.
pub struct VersionPoller {
    controller: Arc<UpdateController>,
    primary: Option<Arc<dyn VersionSource>>,
    fallback: Arc<dyn VersionSource>,
    local: Arc<dyn LocalState>,
    interval: Duration,
    /// Wall time at construction and the matching monotonic instant
    epoch: (DateTime<Utc>, Instant),
}

impl VersionPoller {
    pub fn new(
        controller: Arc<UpdateController>,
        primary: Option<Arc<dyn VersionSource>>,
        fallback: Arc<dyn VersionSource>,
        local: Arc<dyn LocalState>,
        interval: Duration,
    ) -> Self {
        Self {
            controller,
            primary,
            fallback,
            local,
            interval,
            epoch: (Utc::now(), Instant::now()),
        }
    }

    /// Current time, advanced monotonically so throttling ignores wall-clock jumps.
    fn now(&self) -> DateTime<Utc> {
        let (wall, mono) = self.epoch;
        wall + TimeDelta::from_std(mono.elapsed()).unwrap_or(TimeDelta::zero())
    }

    pub fn controller(&self) -> &Arc<UpdateController> {
        &self.controller
    }

    pub async fn check_for_updates(&self, force: bool) -> Result<CheckOutcome, UpdateError> {
        let now = self.now();
        let interval = self.interval;
        if let Err(reason) = self
            .controller
            .transition(|state| state.begin_check(now, force, interval))
        {
            debug!(%reason, force, "Version check skipped");
            return Ok(CheckOutcome::Skipped(reason));
        }

        let record = match self.fetch_latest().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Version check failed");
                self.controller.update(|state| state.fail_check("could not check for updates"));
                return Err(e);
            }
        };

        let checked_at = self.now();
        if let Err(e) = persist::store_check(self.local.as_ref(), checked_at, &record) {
            warn!(error = %e, "Failed to persist version check");
        }

        let next = self
            .controller
            .update(|state| state.finish_check(record.clone(), checked_at));
        if next.has_update {
            info!(current = %next.current_version, latest = %record.version, "Update available");
            Ok(CheckOutcome::UpdateAvailable(record))
        } else {
            debug!(version = %record.version, "Already on the latest version");
            Ok(CheckOutcome::UpToDate(record))
        }
    }

    async fn fetch_latest(&self) -> Result<VersionRecord, UpdateError> {
        let primary_error = match &self.primary {
            Some(primary) => match primary.latest().await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    debug!(source = primary.name(), error = %e, "Primary version source failed");
                    e.to_string()
                }
            },
            None => "not configured".to_string(),
        };

        self.fallback
            .latest()
            .await
            .map_err(|e: FetchError| UpdateError::VersionUnavailable {
                primary: primary_error,
                fallback: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixedVersionSource;
    use crate::update::{MemoryLocalState, PersistedUpdate, UpdatePhase, UpdateState};

    struct Fixture {
        poller: Arc<VersionPoller>,
        primary: Arc<FixedVersionSource>,
        fallback: Arc<FixedVersionSource>,
        local: Arc<MemoryLocalState>,
    }

    fn fixture(current: &str, primary: FixedVersionSource, fallback: FixedVersionSource) -> Fixture {
        let primary = Arc::new(primary);
        let fallback = Arc::new(fallback);
        let local = Arc::new(MemoryLocalState::new());
        let controller = Arc::new(UpdateController::new(UpdateState::initial(
            current,
            &PersistedUpdate::default(),
        )));
        let poller = Arc::new(VersionPoller::new(
            controller,
            Some(primary.clone()),
            fallback.clone(),
            local.clone(),
            Duration::from_secs(300),
        ));
        Fixture {
            poller,
            primary,
            fallback,
            local,
        }
    }

    #[tokio::test]
    async fn test_newer_version_is_reported() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::serving("remote", "1.3.0"),
            FixedVersionSource::unavailable("document"),
        );

        let outcome = f.poller.check_for_updates(false).await.unwrap();
        assert!(matches!(outcome, CheckOutcome::UpdateAvailable(ref r) if r.version == "1.3.0"));

        let state = f.poller.controller().snapshot();
        assert!(state.has_update);
        assert_eq!(state.phase(), UpdatePhase::UpdateAvailable);

        let persisted = PersistedUpdate::load(f.local.as_ref());
        assert_eq!(persisted.latest.map(|r| r.version).as_deref(), Some("1.3.0"));
        assert!(persisted.last_check.is_some());
    }

    #[tokio::test]
    async fn test_same_version_is_up_to_date() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::serving("remote", "1.2.0"),
            FixedVersionSource::unavailable("document"),
        );
        let outcome = f.poller.check_for_updates(false).await.unwrap();
        assert!(matches!(outcome, CheckOutcome::UpToDate(_)));
        assert!(!f.poller.controller().snapshot().has_update);
    }

    #[tokio::test]
    async fn test_unforced_checks_are_throttled() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::serving("remote", "1.2.0"),
            FixedVersionSource::unavailable("document"),
        );

        f.poller.check_for_updates(false).await.unwrap();
        let second = f.poller.check_for_updates(false).await.unwrap();

        assert!(matches!(second, CheckOutcome::Skipped(CheckSkipped::Throttled { .. })));
        assert_eq!(f.primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_forced_checks_always_fetch() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::serving("remote", "1.2.0"),
            FixedVersionSource::unavailable("document"),
        );

        f.poller.check_for_updates(true).await.unwrap();
        f.primary.set("1.4.0");
        let second = f.poller.check_for_updates(true).await.unwrap();

        assert!(matches!(second, CheckOutcome::UpdateAvailable(_)));
        assert_eq!(f.primary.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_checks_fetch_once() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::serving("remote", "1.3.0").with_delay(Duration::from_secs(2)),
            FixedVersionSource::unavailable("document"),
        );

        // Forced checks bypass the throttle, so only the in-progress guard can stop the second
        let (a, b) = tokio::join!(
            f.poller.check_for_updates(true),
            f.poller.check_for_updates(true)
        );

        assert!(matches!(a.unwrap(), CheckOutcome::UpdateAvailable(_)));
        assert_eq!(b.unwrap(), CheckOutcome::Skipped(CheckSkipped::InProgress));
        assert_eq!(f.primary.calls(), 1);
        assert!(!f.poller.controller().snapshot().is_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unforced_trigger_during_check_is_skipped() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::serving("remote", "1.3.0").with_delay(Duration::from_secs(2)),
            FixedVersionSource::unavailable("document"),
        );

        let (a, b) = tokio::join!(
            f.poller.check_for_updates(false),
            f.poller.check_for_updates(false)
        );

        assert!(matches!(a.unwrap(), CheckOutcome::UpdateAvailable(_)));
        assert_eq!(b.unwrap(), CheckOutcome::Skipped(CheckSkipped::InProgress));
        assert_eq!(f.primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_document() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::unavailable("remote"),
            FixedVersionSource::serving("document", "1.3.0"),
        );

        let outcome = f.poller.check_for_updates(false).await.unwrap();
        assert!(matches!(outcome, CheckOutcome::UpdateAvailable(_)));
        assert_eq!(f.primary.calls(), 1);
        assert_eq!(f.fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_sources_down_allows_retry() {
        let f = fixture(
            "1.2.0",
            FixedVersionSource::unavailable("remote"),
            FixedVersionSource::unavailable("document"),
        );

        let err = f.poller.check_for_updates(false).await.unwrap_err();
        assert!(matches!(err, UpdateError::VersionUnavailable { .. }));

        let state = f.poller.controller().snapshot();
        assert!(!state.is_checking);
        assert!(state.error.is_some());
        assert_eq!(state.last_check, None);
        assert_eq!(state.current_version, "1.2.0");

        f.fallback.set("1.2.0");
        let retry = f.poller.check_for_updates(false).await.unwrap();
        assert!(matches!(retry, CheckOutcome::UpToDate(_)));
    }
}
