//! Seams to the platform hosting the worker and its pages.
//!
//! The engine never talks to a browser directly. Whatever embeds it
//! implements these traits: a real host wires them to windows and system
//! notifications, tests and the CLI use lightweight stand-ins.

use async_trait::async_trait;
use url::Url;

use crate::bridge::PageMessage;
use crate::error::HostResult;
use crate::notify::NotificationPayload;

/// Identifier of an open foreground context.
pub type ClientId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: Url,
    pub focused: bool,
}

/// Open pages controlled by the worker.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// All open foreground contexts, including uncontrolled ones.
    async fn clients(&self) -> Vec<ClientInfo>;

    async fn focus(&self, id: &ClientId) -> HostResult<()>;

    async fn post_message(&self, id: &ClientId, message: PageMessage) -> HostResult<()>;

    async fn open_window(&self, url: &Url) -> HostResult<()>;

    /// Take control of every open context so the current generation serves them.
    async fn claim(&self) -> HostResult<()>;
}

/// System notification display.
#[async_trait]
pub trait NotificationHost: Send + Sync {
    async fn show(&self, payload: &NotificationPayload) -> HostResult<()>;

    async fn close(&self, tag: &str);
}

/// Location control of the foreground page running the update orchestrator.
#[async_trait]
pub trait Navigator: Send + Sync {
    fn location(&self) -> Url;

    /// Full navigation; the page is expected to unload afterwards.
    async fn navigate(&self, url: &Url) -> HostResult<()>;

    /// Rewrite the visible location without loading anything.
    async fn replace(&self, url: &Url) -> HostResult<()>;
}
