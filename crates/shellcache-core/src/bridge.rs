//! Control channel between the background worker and foreground pages.
//!
//! Pages post JSON messages tagged by `type`. Recognized kinds are parsed
//! into [`ClientMessage`] and dispatched through a handler map; anything
//! else is dropped without error.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::notify::NotificationData;
use crate::worker::Lifecycle;

/// Messages a page may send to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Activate a waiting worker without waiting for old pages to close
    #[serde(rename = "SKIP_WAITING")]
    ActivateNow,
    /// Ask for the active cache generation; answered on the reply port
    #[serde(rename = "GET_VERSION")]
    VersionQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ActivateNow,
    VersionQuery,
}

impl ClientMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ClientMessage::ActivateNow => MessageKind::ActivateNow,
            ClientMessage::VersionQuery => MessageKind::VersionQuery,
        }
    }
}

/// Answer to [`ClientMessage::VersionQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct VersionReply {
    pub cache_name: String,
    /// Unix milliseconds at the time of the reply
    pub timestamp: i64,
}

/// Messages the worker posts to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageMessage {
    /// The user clicked a notification; the page should route to `url`
    NotificationClick { url: String, data: NotificationData },
}

pub type ReplyPort = Option<oneshot::Sender<VersionReply>>;

type Handler = Box<dyn Fn(ReplyPort) + Send + Sync>;

/// Dispatches page messages to registered handlers.
#[derive(Default)]
pub struct MessageBridge {
    handlers: HashMap<MessageKind, Handler>,
}

impl MessageBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// The worker's standard handlers: activation requests and version queries.
    pub fn standard(lifecycle: Arc<Lifecycle>, cache_name: String) -> Self {
        let mut bridge = Self::new();
        bridge.on(MessageKind::ActivateNow, move |_| lifecycle.request_skip_waiting());
        bridge.on(MessageKind::VersionQuery, move |reply| {
            let Some(reply) = reply else {
                debug!("Version query without a reply port");
                return;
            };
            let answer = VersionReply {
                cache_name: cache_name.clone(),
                timestamp: Utc::now().timestamp_millis(),
            };
            if reply.send(answer).is_err() {
                debug!("Version query reply port closed");
            }
        });
        bridge
    }

    pub fn on<F>(&mut self, kind: MessageKind, handler: F)
    where
        F: Fn(ReplyPort) + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Handle one raw message. Returns whether a handler ran.
    pub fn dispatch(&self, raw: &serde_json::Value, reply: ReplyPort) -> bool {
        let message: ClientMessage = match serde_json::from_value(raw.clone()) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Ignoring unrecognized page message");
                return false;
            }
        };
        self.dispatch_message(message, reply)
    }

    pub fn dispatch_message(&self, message: ClientMessage, reply: ReplyPort) -> bool {
        match self.handlers.get(&message.kind()) {
            Some(handler) => {
                debug!(kind = ?message.kind(), "Dispatching page message");
                handler(reply);
                true
            }
            None => {
                debug!(kind = ?message.kind(), "No handler registered");
                false
            }
        }
    }
}
