use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use url::Url;

use crate::cache::{purge_all, CacheStorage};
use crate::error::UpdateError;
use crate::host::Navigator;

use super::{persist, LocalState, UpdateController};

/// Query parameters the orchestrator owns on the page location.
pub const PARAM_VERSION: &str = "_v";
pub const PARAM_TIMESTAMP: &str = "_t";
pub const PARAM_UPDATED: &str = "_updated";

const UPDATE_PARAMS: [&str; 3] = [PARAM_VERSION, PARAM_TIMESTAMP, PARAM_UPDATED];

/// Location to reload into: any earlier update markers are replaced.
pub fn reload_url(location: &Url, version: &str, at: DateTime<Utc>) -> Url {
    let mut url = without_update_params(location);
    url.query_pairs_mut()
        .append_pair(PARAM_VERSION, version)
        .append_pair(PARAM_TIMESTAMP, &at.timestamp_millis().to_string())
        .append_pair(PARAM_UPDATED, "true");
    url
}

/// Whether the page was loaded by a completed update.
pub fn was_just_updated(location: &Url) -> bool {
    location
        .query_pairs()
        .any(|(k, v)| k == PARAM_UPDATED && v == "true")
}

pub fn without_update_params(location: &Url) -> Url {
    let kept: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(k, _)| !UPDATE_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = location.clone();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

/// Applies a pending update: purge caches, record the version, reload.
pub struct UpdateOrchestrator {
    controller: Arc<UpdateController>,
    storage: Arc<dyn CacheStorage>,
    local: Arc<dyn LocalState>,
    navigator: Arc<dyn Navigator>,
}

impl UpdateOrchestrator {
    pub fn new(
        controller: Arc<UpdateController>,
        storage: Arc<dyn CacheStorage>,
        local: Arc<dyn LocalState>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            controller,
            storage,
            local,
            navigator,
        }
    }

    /// Returns the URL navigated to. On any failure the state goes back to
    /// update-available with the error recorded.
    pub async fn apply_update(&self) -> Result<Url, UpdateError> {
        let applying = self.controller.transition(|state| state.begin_apply())?;
        let Some(target) = applying.latest_version.map(|record| record.version) else {
            // begin_apply refuses states without a latest version
            return Err(UpdateError::NoUpdateAvailable);
        };
        info!(from = %applying.current_version, to = %target, "Applying update");

        match self.run(&target).await {
            Ok(url) => {
                self.controller.update(|state| state.after_reload(&target));
                info!(version = %target, url = %url, "Update applied, reloading");
                Ok(url)
            }
            Err(e) => {
                warn!(version = %target, error = %e, "Update failed");
                let message = e.to_string();
                self.controller.update(|state| state.fail_apply(message));
                Err(e)
            }
        }
    }

    async fn run(&self, target: &str) -> Result<Url, UpdateError> {
        let deleted = purge_all(self.storage.as_ref()).await?;
        info!(generations = deleted.len(), "Cache generations purged");

        let now = Utc::now();
        persist::store_applied(self.local.as_ref(), target, now)?;

        let url = reload_url(&self.navigator.location(), target, now);
        self.navigator.navigate(&url).await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedEntry, MemoryStorage, RequestKey};
    use crate::error::HostError;
    use crate::net::ResponseSnapshot;
    use crate::test_support::{url, ReadOnlyLocalState, RecordingNavigator};
    use crate::update::{MemoryLocalState, PersistedUpdate, UpdatePhase, UpdateState, VersionRecord};
    use chrono::TimeZone;

    fn available(current: &str, latest: &str) -> Arc<UpdateController> {
        let state = UpdateState::initial(current, &PersistedUpdate::default())
            .finish_check(VersionRecord::new(latest, ""), Utc::now());
        Arc::new(UpdateController::new(state))
    }

    async fn seeded_storage() -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        for name in ["static-v1", "root-v1", "dynamic-v1"] {
            storage
                .put(name, RequestKey::get(&url("/")), CachedEntry::new(ResponseSnapshot::ok("x")))
                .await
                .unwrap();
        }
        storage
    }

    #[test]
    fn test_reload_url_replaces_markers() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let location = url("/shifts?week=9&_v=1.1.0&_updated=true&_t=1");

        let reloaded = reload_url(&location, "1.3.0", at);
        let pairs: Vec<(String, String)> = reloaded.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("week".to_string(), "9".to_string()),
                ("_v".to_string(), "1.3.0".to_string()),
                ("_t".to_string(), at.timestamp_millis().to_string()),
                ("_updated".to_string(), "true".to_string()),
            ]
        );
        assert_eq!(reloaded.path(), "/shifts");
    }

    #[test]
    fn test_strip_markers() {
        let location = url("/calendar?_v=1.3.0&_t=5&_updated=true");
        assert!(was_just_updated(&location));
        let clean = without_update_params(&location);
        assert_eq!(clean.as_str(), "https://app.test/calendar");
        assert!(!was_just_updated(&clean));
    }

    #[tokio::test]
    async fn test_apply_purges_persists_and_reloads() {
        let storage = seeded_storage().await;
        let local = Arc::new(MemoryLocalState::new());
        let navigator = Arc::new(RecordingNavigator::at(url("/calendar")));
        let controller = available("1.2.0", "1.3.0");
        let orchestrator =
            UpdateOrchestrator::new(controller.clone(), storage.clone(), local.clone(), navigator.clone());

        let reloaded = orchestrator.apply_update().await.unwrap();

        assert!(storage.generations().await.unwrap().is_empty());
        let persisted = PersistedUpdate::load(local.as_ref());
        assert_eq!(persisted.version.as_deref(), Some("1.3.0"));
        assert!(persisted.last_update.is_some());

        let query = reloaded.query().unwrap_or_default();
        assert!(query.contains("_v=1.3.0"));
        assert!(query.contains("_updated=true"));
        assert_eq!(navigator.navigated(), vec![reloaded]);

        let state = controller.snapshot();
        assert_eq!(state.current_version, "1.3.0");
        assert_eq!(state.phase(), UpdatePhase::Idle);
    }

    #[tokio::test]
    async fn test_apply_without_update_is_refused() {
        let controller = Arc::new(UpdateController::new(UpdateState::initial(
            "1.2.0",
            &PersistedUpdate::default(),
        )));
        let orchestrator = UpdateOrchestrator::new(
            controller,
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryLocalState::new()),
            Arc::new(RecordingNavigator::at(url("/"))),
        );
        assert!(matches!(
            orchestrator.apply_update().await,
            Err(UpdateError::NoUpdateAvailable)
        ));
    }

    #[tokio::test]
    async fn test_navigation_failure_returns_to_available() {
        let storage = seeded_storage().await;
        let navigator = Arc::new(RecordingNavigator::failing(url("/")));
        let controller = available("1.2.0", "1.3.0");
        let orchestrator = UpdateOrchestrator::new(
            controller.clone(),
            storage,
            Arc::new(MemoryLocalState::new()),
            navigator.clone(),
        );

        let err = orchestrator.apply_update().await.unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Navigation(HostError::NavigationBlocked { .. })
        ));

        let state = controller.snapshot();
        assert_eq!(state.phase(), UpdatePhase::UpdateAvailable);
        assert!(state.error.is_some());
        assert!(navigator.navigated().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_navigate() {
        let navigator = Arc::new(RecordingNavigator::at(url("/")));
        let controller = available("1.2.0", "1.3.0");
        let orchestrator = UpdateOrchestrator::new(
            controller.clone(),
            seeded_storage().await,
            Arc::new(ReadOnlyLocalState),
            navigator.clone(),
        );

        assert!(matches!(
            orchestrator.apply_update().await,
            Err(UpdateError::Persist(_))
        ));
        assert!(navigator.navigated().is_empty());
        assert!(!controller.snapshot().is_applying);
    }

    #[tokio::test]
    async fn test_second_apply_after_success_is_refused() {
        let orchestrator = UpdateOrchestrator::new(
            available("1.2.0", "1.3.0"),
            seeded_storage().await,
            Arc::new(MemoryLocalState::new()),
            Arc::new(RecordingNavigator::at(url("/"))),
        );
        orchestrator.apply_update().await.unwrap();
        assert!(matches!(
            orchestrator.apply_update().await,
            Err(UpdateError::NoUpdateAvailable)
        ));
    }
}
