//! Terminal stand-ins for the browser: windows, notifications and the page
//! location are printed instead of shown.

use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use shellcache_core::bridge::PageMessage;
use shellcache_core::error::{HostError, HostResult};
use shellcache_core::host::{ClientHost, ClientId, ClientInfo, Navigator, NotificationHost};
use shellcache_core::notify::NotificationPayload;

/// No pages are ever open; opened windows are printed.
pub struct ConsoleClients;

#[async_trait]
impl ClientHost for ConsoleClients {
    async fn clients(&self) -> Vec<ClientInfo> {
        Vec::new()
    }

    async fn focus(&self, id: &ClientId) -> HostResult<()> {
        Err(HostError::UnknownClient(id.clone()))
    }

    async fn post_message(&self, id: &ClientId, _message: PageMessage) -> HostResult<()> {
        Err(HostError::UnknownClient(id.clone()))
    }

    async fn open_window(&self, url: &Url) -> HostResult<()> {
        println!("open window: {url}");
        Ok(())
    }

    async fn claim(&self) -> HostResult<()> {
        Ok(())
    }
}

pub struct ConsoleNotifications;

#[async_trait]
impl NotificationHost for ConsoleNotifications {
    async fn show(&self, payload: &NotificationPayload) -> HostResult<()> {
        println!("[{}] {}", payload.tag, payload.title);
        if !payload.body.is_empty() {
            println!("    {}", payload.body);
        }
        Ok(())
    }

    async fn close(&self, _tag: &str) {}
}

/// Records the location; navigations are printed.
pub struct ConsoleNavigator {
    location: Mutex<Url>,
}

impl ConsoleNavigator {
    pub fn new(location: Url) -> Self {
        Self {
            location: Mutex::new(location),
        }
    }
}

#[async_trait]
impl Navigator for ConsoleNavigator {
    fn location(&self) -> Url {
        self.location
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn navigate(&self, url: &Url) -> HostResult<()> {
        println!("reload: {url}");
        *self.location.lock().unwrap_or_else(|e| e.into_inner()) = url.clone();
        Ok(())
    }

    async fn replace(&self, url: &Url) -> HostResult<()> {
        println!("location: {url}");
        *self.location.lock().unwrap_or_else(|e| e.into_inner()) = url.clone();
        Ok(())
    }
}
