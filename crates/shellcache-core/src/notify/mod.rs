//! Push notification intake and click routing.

pub mod payload;
pub mod router;

pub use payload::{NotificationData, NotificationPayload};
pub use router::{ClickDelivery, ClickOutcome, NotificationRouter, PendingRouteRequest};
