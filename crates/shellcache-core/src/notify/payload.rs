use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::NotificationConfig;

/// Routing metadata attached to a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    /// Unix milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

/// A push message ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub silent: bool,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

/// Wire shape of a push; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushWire {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    badge: Option<String>,
    tag: Option<String>,
    require_interaction: Option<bool>,
    silent: Option<bool>,
    vibrate: Option<Vec<u32>>,
    data: Option<DataWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataWire {
    url: Option<String>,
    shift_type: Option<String>,
    notification_type: Option<String>,
    timestamp: Option<Value>,
}

impl NotificationPayload {
    /// Notification shown when a push carries nothing usable.
    pub fn defaults(config: &NotificationConfig, now: DateTime<Utc>) -> Self {
        Self {
            title: config.default_title.clone(),
            body: config.default_body.clone(),
            icon: config.default_icon.clone(),
            badge: config.default_badge.clone(),
            tag: config.default_tag.clone(),
            require_interaction: false,
            silent: false,
            vibrate: config.vibrate.clone(),
            data: NotificationData {
                url: Some("/".to_string()),
                timestamp: now.timestamp_millis(),
                ..Default::default()
            },
        }
    }

    /// Build a payload from raw push bytes.
    ///
    /// JSON objects fill in whatever fields they carry. Anything else becomes
    /// the body of an otherwise default notification. Never fails.
    pub fn from_push(data: Option<&[u8]>, config: &NotificationConfig, now: DateTime<Utc>) -> Self {
        let mut payload = Self::defaults(config, now);
        let Some(bytes) = data.filter(|b| !b.is_empty()) else {
            return payload;
        };

        match serde_json::from_slice::<PushWire>(bytes) {
            Ok(wire) => payload.merge(wire),
            Err(e) => {
                debug!(error = %e, "Push payload is not JSON, using it as text");
                payload.body = String::from_utf8_lossy(bytes).into_owned();
            }
        }
        payload
    }

    fn merge(&mut self, wire: PushWire) {
        if let Some(title) = wire.title {
            self.title = title;
        }
        if let Some(body) = wire.body {
            self.body = body;
        }
        if let Some(icon) = wire.icon {
            self.icon = icon;
        }
        if let Some(badge) = wire.badge {
            self.badge = badge;
        }
        if let Some(tag) = wire.tag {
            self.tag = tag;
        }
        self.require_interaction = wire.require_interaction.unwrap_or(self.require_interaction);
        self.silent = wire.silent.unwrap_or(self.silent);
        if let Some(vibrate) = wire.vibrate {
            self.vibrate = vibrate;
        }
        if let Some(data) = wire.data {
            if data.url.is_some() {
                self.data.url = data.url;
            }
            self.data.shift_type = data.shift_type;
            self.data.notification_type = data.notification_type;
            if let Some(ts) = data.timestamp.as_ref().and_then(parse_timestamp) {
                self.data.timestamp = ts;
            }
        }
    }
}

/// Accept unix milliseconds or an RFC 3339 string.
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis())
            .or_else(|| s.parse().ok()),
        _ => None,
    }
}
