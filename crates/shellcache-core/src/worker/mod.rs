//! The background worker: one entry point per platform event.
//!
//! The host delivers install, activate, fetch, push, notification-click and
//! message events; each is an independent future that may run concurrently
//! with the others.

pub mod lifecycle;

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::bridge::{MessageBridge, ReplyPort};
use crate::cache::{CacheStorage, CacheStoreManager, InstallReport};
use crate::config::{ConfigError, ShellConfig};
use crate::error::WorkerError;
use crate::host::{ClientHost, NotificationHost};
use crate::net::{Fetcher, Request};
use crate::notify::{ClickOutcome, NotificationPayload, NotificationRouter};
use crate::strategy::{RouteOutcome, Router};

pub use lifecycle::{Lifecycle, WorkerState};

pub struct BackgroundWorker {
    lifecycle: Arc<Lifecycle>,
    manager: CacheStoreManager,
    router: Router,
    bridge: MessageBridge,
    notification_router: NotificationRouter,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<dyn ClientHost>,
    notifications: Arc<dyn NotificationHost>,
}

impl BackgroundWorker {
    pub fn new(
        config: &ShellConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientHost>,
        notifications: Arc<dyn NotificationHost>,
    ) -> Result<Self, ConfigError> {
        let generations = config.generations();
        let manifest = config
            .cache
            .manifest
            .iter()
            .map(|path| config.resolve(path))
            .collect::<Result<Vec<_>, _>>()?;
        let root_document = config.resolve(&config.cache.root_document)?;

        let manager = CacheStoreManager::new(storage, generations.clone(), manifest, root_document);
        let router = Router::new(&config.routing, manager.clone(), fetcher.clone())?;
        let lifecycle = Arc::new(Lifecycle::new());
        let bridge = MessageBridge::standard(lifecycle.clone(), generations.static_name());
        let notification_router =
            NotificationRouter::new(config.origin.clone(), config.notifications.clone());

        Ok(Self {
            lifecycle,
            manager,
            router,
            bridge,
            notification_router,
            fetcher,
            clients,
            notifications,
        })
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Pick up where an earlier run left off: a stored static generation for
    /// the current tag means install already completed.
    pub async fn resume(&self) -> Result<WorkerState, WorkerError> {
        if self.lifecycle.state() == WorkerState::Parsed {
            let stored = self.manager.storage().generations().await?;
            if stored.contains(&self.manager.generations().static_name()) {
                self.lifecycle.transition(WorkerState::Installing)?;
                self.lifecycle.transition(WorkerState::Installed)?;
            }
        }
        Ok(self.lifecycle.state())
    }

    /// Pre-cache the install manifest and ask to activate right away.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.lifecycle.transition(WorkerState::Installing)?;
        match self.manager.install(self.fetcher.as_ref()).await {
            Ok(report) => {
                self.lifecycle.transition(WorkerState::Installed)?;
                self.lifecycle.request_skip_waiting();
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Install failed");
                self.lifecycle.transition(WorkerState::Redundant)?;
                Err(e.into())
            }
        }
    }

    /// Drop stale generations and take control of every open page.
    /// Returns the deleted generation names.
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        self.lifecycle.transition(WorkerState::Activating)?;
        let deleted = match self.manager.activate().await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(error = %e, "Activation failed");
                self.lifecycle.transition(WorkerState::Redundant)?;
                return Err(e.into());
            }
        };
        if let Err(e) = self.clients.claim().await {
            warn!(error = %e, "Failed to claim clients");
        }
        self.lifecycle.transition(WorkerState::Activated)?;
        info!(deleted = deleted.len(), "Worker activated");
        Ok(deleted)
    }

    pub async fn fetch(&self, request: &Request) -> RouteOutcome {
        self.router.handle(request).await
    }

    pub async fn push(&self, data: Option<&[u8]>) -> NotificationPayload {
        self.notification_router
            .handle_push(data, self.notifications.as_ref())
            .await
    }

    pub async fn notification_click(&self, payload: &NotificationPayload) -> ClickOutcome {
        self.notification_router
            .handle_click(payload, self.clients.as_ref(), self.notifications.as_ref())
            .await
    }

    /// Handle a page message. Returns whether it was recognized.
    pub fn message(&self, raw: &Value, reply: ReplyPort) -> bool {
        self.bridge.dispatch(raw, reply)
    }
}
