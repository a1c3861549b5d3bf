use tracing::{debug, info, warn};
use url::Url;

use crate::bridge::PageMessage;
use crate::config::NotificationConfig;
use crate::host::{ClientHost, ClientId, NotificationHost};

use super::{NotificationData, NotificationPayload};

const WAREHOUSE_SHIFT: &str = "warehouse";
const EVENT_SHIFT: &str = "event";

/// How a notification click reached the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickDelivery {
    /// An open page was focused and told to route
    Focused(ClientId),
    /// No page was open; a new one was opened at the target
    Opened,
    /// Neither focusing nor opening worked
    Failed,
}

/// The route a click resolved to, delivered once to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRouteRequest {
    pub url: String,
    pub data: NotificationData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickOutcome {
    pub route: PendingRouteRequest,
    pub delivery: ClickDelivery,
}

/// Push intake and click routing.
#[derive(Debug, Clone)]
pub struct NotificationRouter {
    origin: Url,
    config: NotificationConfig,
}

impl NotificationRouter {
    pub fn new(origin: Url, config: NotificationConfig) -> Self {
        Self { origin, config }
    }

    /// Target route for a clicked notification.
    ///
    /// Shift type decides first: warehouse shifts always go to check-in and
    /// event shifts to the calendar, whatever the notification type says.
    pub fn resolve_target(&self, data: &NotificationData) -> String {
        match data.shift_type.as_deref() {
            Some(WAREHOUSE_SHIFT) => self.config.warehouse_route.clone(),
            Some(EVENT_SHIFT) => self.config.calendar_route.clone(),
            _ => data
                .url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "/".to_string()),
        }
    }

    /// Parse and display a push. A notification is shown even for garbage.
    pub async fn handle_push(
        &self,
        data: Option<&[u8]>,
        notifications: &dyn NotificationHost,
    ) -> NotificationPayload {
        let payload = NotificationPayload::from_push(data, &self.config, chrono::Utc::now());
        if let Err(e) = notifications.show(&payload).await {
            warn!(tag = %payload.tag, error = %e, "Failed to show notification");
        } else {
            debug!(tag = %payload.tag, title = %payload.title, "Notification shown");
        }
        payload
    }

    /// Close the notification and bring the user to its target.
    pub async fn handle_click(
        &self,
        payload: &NotificationPayload,
        clients: &dyn ClientHost,
        notifications: &dyn NotificationHost,
    ) -> ClickOutcome {
        notifications.close(&payload.tag).await;

        let route = PendingRouteRequest {
            url: self.resolve_target(&payload.data),
            data: payload.data.clone(),
        };
        info!(route = %route.url, "Notification clicked");

        let open = clients.clients().await;
        let chosen = open.iter().find(|c| c.focused).or_else(|| open.first());

        let delivery = match chosen {
            Some(client) => {
                if let Err(e) = clients.focus(&client.id).await {
                    warn!(client = %client.id, error = %e, "Failed to focus client");
                }
                let message = PageMessage::NotificationClick {
                    url: route.url.clone(),
                    data: route.data.clone(),
                };
                match clients.post_message(&client.id, message).await {
                    Ok(()) => ClickDelivery::Focused(client.id.clone()),
                    Err(e) => {
                        warn!(client = %client.id, error = %e, "Failed to deliver route, opening window");
                        self.open(clients, &route.url).await
                    }
                }
            }
            None => self.open(clients, &route.url).await,
        };

        ClickOutcome { route, delivery }
    }

    async fn open(&self, clients: &dyn ClientHost, target: &str) -> ClickDelivery {
        let url = match self.origin.join(target) {
            Ok(url) => url,
            Err(e) => {
                warn!(route = target, error = %e, "Unresolvable notification target");
                return ClickDelivery::Failed;
            }
        };
        match clients.open_window(&url).await {
            Ok(()) => ClickDelivery::Opened,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to open window");
                ClickDelivery::Failed
            }
        }
    }
}
