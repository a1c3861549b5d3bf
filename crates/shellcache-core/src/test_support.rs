//! Scripted stand-ins for the network and the host platform.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::bridge::PageMessage;
use crate::error::{FetchError, HostError, HostResult, StateError};
use crate::host::{ClientHost, ClientId, ClientInfo, Navigator, NotificationHost};
use crate::net::{Fetcher, Request, ResponseSnapshot};
use crate::notify::NotificationPayload;
use crate::update::{LocalState, VersionRecord, VersionSource};

pub const ORIGIN: &str = "https://app.test";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Answers requests by path from a fixed script.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, ResponseSnapshot>,
    offline: bool,
    delay: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    last: Mutex<Option<Request>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, path: &str, response: ResponseSnapshot) -> Self {
        self.responses.insert(path.to_string(), response);
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, FetchError> {
        let path = request.url.path().to_string();
        *self.calls.lock().unwrap().entry(path.clone()).or_default() += 1;
        *self.last.lock().unwrap() = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline {
            return Err(FetchError::Network("offline".to_string()));
        }
        self.responses
            .get(&path)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("no route to {path}")))
    }
}

/// Records everything done to the open pages.
#[derive(Default)]
pub struct RecordingClients {
    clients: Vec<ClientInfo>,
    focused: Mutex<Vec<ClientId>>,
    messages: Mutex<Vec<(ClientId, PageMessage)>>,
    opened: Mutex<Vec<Url>>,
    claims: AtomicUsize,
    /// Listed clients that have already gone away
    stale: bool,
}

impl RecordingClients {
    pub fn with_clients(ids: &[&str]) -> Self {
        Self {
            clients: ids
                .iter()
                .map(|id| ClientInfo {
                    id: id.to_string(),
                    url: url("/"),
                    focused: false,
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Clients that are listed but closed before they can be reached.
    pub fn stale(ids: &[&str]) -> Self {
        Self {
            stale: true,
            ..Self::with_clients(ids)
        }
    }

    pub fn focused(&self) -> Vec<ClientId> {
        self.focused.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<(ClientId, PageMessage)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }

    pub fn claims(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientHost for RecordingClients {
    async fn clients(&self) -> Vec<ClientInfo> {
        self.clients.clone()
    }

    async fn focus(&self, id: &ClientId) -> HostResult<()> {
        if self.stale {
            return Err(HostError::UnknownClient(id.clone()));
        }
        self.focused.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn post_message(&self, id: &ClientId, message: PageMessage) -> HostResult<()> {
        if self.stale {
            return Err(HostError::UnknownClient(id.clone()));
        }
        self.messages.lock().unwrap().push((id.clone(), message));
        Ok(())
    }

    async fn open_window(&self, url: &Url) -> HostResult<()> {
        self.opened.lock().unwrap().push(url.clone());
        Ok(())
    }

    async fn claim(&self) -> HostResult<()> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    shown: Mutex<Vec<NotificationPayload>>,
    closed: Mutex<Vec<String>>,
}

impl RecordingNotifications {
    pub fn shown(&self) -> Vec<NotificationPayload> {
        self.shown.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationHost for RecordingNotifications {
    async fn show(&self, payload: &NotificationPayload) -> HostResult<()> {
        self.shown.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) {
        self.closed.lock().unwrap().push(tag.to_string());
    }
}

/// A page location that records navigations instead of performing them.
pub struct RecordingNavigator {
    location: Mutex<Url>,
    navigated: Mutex<Vec<Url>>,
    replaced: Mutex<Vec<Url>>,
    fail_navigation: bool,
}

impl RecordingNavigator {
    pub fn at(location: Url) -> Self {
        Self {
            location: Mutex::new(location),
            navigated: Mutex::new(Vec::new()),
            replaced: Mutex::new(Vec::new()),
            fail_navigation: false,
        }
    }

    pub fn failing(location: Url) -> Self {
        Self {
            fail_navigation: true,
            ..Self::at(location)
        }
    }

    pub fn navigated(&self) -> Vec<Url> {
        self.navigated.lock().unwrap().clone()
    }

    pub fn replaced(&self) -> Vec<Url> {
        self.replaced.lock().unwrap().clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    fn location(&self) -> Url {
        self.location.lock().unwrap().clone()
    }

    async fn navigate(&self, url: &Url) -> HostResult<()> {
        if self.fail_navigation {
            return Err(HostError::NavigationBlocked {
                url: url.to_string(),
                reason: "blocked by test".to_string(),
            });
        }
        self.navigated.lock().unwrap().push(url.clone());
        *self.location.lock().unwrap() = url.clone();
        Ok(())
    }

    async fn replace(&self, url: &Url) -> HostResult<()> {
        self.replaced.lock().unwrap().push(url.clone());
        *self.location.lock().unwrap() = url.clone();
        Ok(())
    }
}

/// Version source with a settable answer.
pub struct FixedVersionSource {
    name: &'static str,
    record: Mutex<Option<VersionRecord>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixedVersionSource {
    pub fn serving(name: &'static str, version: &str) -> Self {
        Self {
            name,
            record: Mutex::new(Some(VersionRecord::new(version, "2026-01-01T00:00:00Z"))),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(name: &'static str) -> Self {
        Self {
            name,
            record: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer only after `delay`, so overlapping checks really overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, version: &str) {
        *self.record.lock().unwrap() = Some(VersionRecord::new(version, "2026-01-01T00:00:00Z"));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionSource for FixedVersionSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn latest(&self) -> Result<VersionRecord, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.record
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FetchError::Network(format!("{} unreachable", self.name)))
    }
}

/// Local state whose writes always fail.
#[derive(Default)]
pub struct ReadOnlyLocalState;

impl LocalState for ReadOnlyLocalState {
    fn get(&self, _key: &str) -> Result<Option<String>, StateError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StateError> {
        Err(StateError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
}
