//! The update state machine.
//!
//! [`UpdateState`] is a plain value. Every transition borrows the current
//! state and returns the next one (or the reason it was refused), so guards
//! and effects can be tested without any I/O and committed atomically by
//! [`super::UpdateController`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::UpdateError;

use super::{PersistedUpdate, VersionRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UpdateState {
    pub current_version: String,
    pub latest_version: Option<VersionRecord>,
    pub has_update: bool,
    pub is_checking: bool,
    pub is_applying: bool,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_check: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Named position in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    UpToDate,
    UpdateAvailable,
    Applying,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePhase::Idle => write!(f, "idle"),
            UpdatePhase::Checking => write!(f, "checking"),
            UpdatePhase::UpToDate => write!(f, "up to date"),
            UpdatePhase::UpdateAvailable => write!(f, "update available"),
            UpdatePhase::Applying => write!(f, "applying"),
        }
    }
}

/// Why a check did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSkipped {
    /// A check completed recently; `retry_in` until the throttle lifts
    Throttled { retry_in: Duration },
    InProgress,
    Applying,
}

impl fmt::Display for CheckSkipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckSkipped::Throttled { retry_in } => {
                write!(f, "checked recently, next check in {}s", retry_in.as_secs())
            }
            CheckSkipped::InProgress => write!(f, "a check is already running"),
            CheckSkipped::Applying => write!(f, "an update is being applied"),
        }
    }
}

impl UpdateState {
    /// Startup state from what the previous page load persisted.
    pub fn initial(bundled_version: &str, persisted: &PersistedUpdate) -> Self {
        let current_version = persisted
            .version
            .clone()
            .unwrap_or_else(|| bundled_version.to_string());
        let has_update = persisted
            .latest
            .as_ref()
            .is_some_and(|latest| latest.version != current_version);
        Self {
            current_version,
            latest_version: persisted.latest.clone(),
            has_update,
            last_check: persisted.last_check,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        if self.is_applying {
            UpdatePhase::Applying
        } else if self.is_checking {
            UpdatePhase::Checking
        } else if self.has_update {
            UpdatePhase::UpdateAvailable
        } else if self.latest_version.is_some() {
            UpdatePhase::UpToDate
        } else {
            UpdatePhase::Idle
        }
    }

    pub fn begin_check(
        &self,
        now: DateTime<Utc>,
        force: bool,
        interval: Duration,
    ) -> Result<Self, CheckSkipped> {
        if self.is_applying {
            return Err(CheckSkipped::Applying);
        }
        if self.is_checking {
            return Err(CheckSkipped::InProgress);
        }
        if !force {
            if let Some(last) = self.last_check {
                let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
                let elapsed = now - last;
                if elapsed < interval {
                    let retry_in = (interval - elapsed).to_std().unwrap_or_default();
                    return Err(CheckSkipped::Throttled { retry_in });
                }
            }
        }
        Ok(Self {
            is_checking: true,
            error: None,
            ..self.clone()
        })
    }

    pub fn finish_check(&self, latest: VersionRecord, now: DateTime<Utc>) -> Self {
        Self {
            has_update: latest.version != self.current_version,
            latest_version: Some(latest),
            is_checking: false,
            last_check: Some(now),
            error: None,
            ..self.clone()
        }
    }

    /// Both sources failed. Versions are kept and `last_check` is not
    /// advanced so the next trigger retries.
    pub fn fail_check(&self, error: impl Into<String>) -> Self {
        Self {
            is_checking: false,
            error: Some(error.into()),
            ..self.clone()
        }
    }

    /// Only valid from [`UpdatePhase::UpdateAvailable`].
    pub fn begin_apply(&self) -> Result<Self, UpdateError> {
        match self.phase() {
            UpdatePhase::UpdateAvailable if self.latest_version.is_some() => {}
            UpdatePhase::Applying => return Err(UpdateError::AlreadyApplying),
            UpdatePhase::Checking => return Err(UpdateError::CheckInProgress),
            _ => return Err(UpdateError::NoUpdateAvailable),
        }
        Ok(Self {
            is_applying: true,
            error: None,
            ..self.clone()
        })
    }

    /// Back to `UpdateAvailable` with the failure recorded.
    pub fn fail_apply(&self, error: impl Into<String>) -> Self {
        Self {
            is_applying: false,
            error: Some(error.into()),
            ..self.clone()
        }
    }

    /// Fresh state once the page has reloaded onto `applied`.
    pub fn after_reload(&self, applied: &str) -> Self {
        Self {
            current_version: applied.to_string(),
            last_check: self.last_check,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INTERVAL: Duration = Duration::from_secs(300);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn running(version: &str) -> UpdateState {
        UpdateState::initial(version, &PersistedUpdate::default())
    }

    fn record(version: &str) -> VersionRecord {
        VersionRecord::new(version, "2026-03-01T00:00:00Z")
    }

    #[test]
    fn test_initial_prefers_persisted_version() {
        let persisted = PersistedUpdate {
            version: Some("1.3.0".to_string()),
            latest: Some(record("1.3.0")),
            ..Default::default()
        };
        let state = UpdateState::initial("1.2.0", &persisted);
        assert_eq!(state.current_version, "1.3.0");
        assert!(!state.has_update);
        assert_eq!(state.phase(), UpdatePhase::UpToDate);

        assert_eq!(running("1.2.0").phase(), UpdatePhase::Idle);
    }

    #[test]
    fn test_initial_restores_pending_update() {
        let persisted = PersistedUpdate {
            latest: Some(record("1.3.0")),
            ..Default::default()
        };
        let state = UpdateState::initial("1.2.0", &persisted);
        assert!(state.has_update);
        assert_eq!(state.phase(), UpdatePhase::UpdateAvailable);
    }

    #[test]
    fn test_newer_version_means_update() {
        let checking = running("1.2.0").begin_check(t0(), false, INTERVAL).unwrap();
        assert_eq!(checking.phase(), UpdatePhase::Checking);

        let done = checking.finish_check(record("1.3.0"), t0());
        assert!(done.has_update);
        assert_eq!(done.phase(), UpdatePhase::UpdateAvailable);
        assert_eq!(done.last_check, Some(t0()));

        let same = running("1.2.0")
            .begin_check(t0(), false, INTERVAL)
            .unwrap()
            .finish_check(record("1.2.0"), t0());
        assert!(!same.has_update);
        assert_eq!(same.phase(), UpdatePhase::UpToDate);
    }

    #[test]
    fn test_throttle_and_force() {
        let checked = running("1.2.0").finish_check(record("1.2.0"), t0());
        let soon = t0() + TimeDelta::seconds(60);

        match checked.begin_check(soon, false, INTERVAL) {
            Err(CheckSkipped::Throttled { retry_in }) => assert_eq!(retry_in, Duration::from_secs(240)),
            other => panic!("expected throttle, got {other:?}"),
        }
        assert!(checked.begin_check(soon, true, INTERVAL).is_ok());
        assert!(checked
            .begin_check(t0() + TimeDelta::seconds(300), false, INTERVAL)
            .is_ok());
    }

    #[test]
    fn test_checking_guard_ignores_force() {
        let checking = running("1.2.0").begin_check(t0(), true, INTERVAL).unwrap();
        assert_eq!(
            checking.begin_check(t0(), true, INTERVAL),
            Err(CheckSkipped::InProgress)
        );
    }

    #[test]
    fn test_failed_check_keeps_versions() {
        let available = running("1.2.0").finish_check(record("1.3.0"), t0());
        let later = t0() + TimeDelta::seconds(600);
        let failed = available
            .begin_check(later, false, INTERVAL)
            .unwrap()
            .fail_check("could not check");

        assert_eq!(failed.current_version, "1.2.0");
        assert_eq!(failed.latest_version, Some(record("1.3.0")));
        assert!(failed.has_update);
        assert!(!failed.is_checking);
        assert_eq!(failed.last_check, Some(t0()));
        assert_eq!(failed.error.as_deref(), Some("could not check"));
    }

    #[test]
    fn test_apply_guards() {
        assert!(matches!(
            running("1.2.0").begin_apply(),
            Err(UpdateError::NoUpdateAvailable)
        ));

        let available = running("1.2.0").finish_check(record("1.3.0"), t0());
        let applying = available.begin_apply().unwrap();
        assert_eq!(applying.phase(), UpdatePhase::Applying);
        assert!(matches!(applying.begin_apply(), Err(UpdateError::AlreadyApplying)));
        assert_eq!(
            applying.begin_check(t0(), true, INTERVAL),
            Err(CheckSkipped::Applying)
        );

        let failed = applying.fail_apply("navigation blocked");
        assert_eq!(failed.phase(), UpdatePhase::UpdateAvailable);
        assert_eq!(failed.error.as_deref(), Some("navigation blocked"));
    }

    #[test]
    fn test_apply_refused_while_checking() {
        let available = running("1.2.0").finish_check(record("1.3.0"), t0());
        let rechecking = available
            .begin_check(t0() + TimeDelta::seconds(600), false, INTERVAL)
            .unwrap();
        assert!(rechecking.has_update);
        assert_eq!(rechecking.phase(), UpdatePhase::Checking);

        assert!(matches!(rechecking.begin_apply(), Err(UpdateError::CheckInProgress)));
    }

    #[test]
    fn test_after_reload_is_fresh() {
        let applying = running("1.2.0")
            .finish_check(record("1.3.0"), t0())
            .begin_apply()
            .unwrap();
        let fresh = applying.after_reload("1.3.0");

        assert_eq!(fresh.current_version, "1.3.0");
        assert!(!fresh.has_update);
        assert!(!fresh.is_applying);
        assert_eq!(fresh.latest_version, None);
        assert_eq!(fresh.phase(), UpdatePhase::Idle);
    }
}
