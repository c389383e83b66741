//! Best-effort notification delivery.

use killwatch_core::{Category, HealthMonitor};
use metrics::counter;
use std::sync::Arc;

use crate::format::Notification;
use crate::matrix::ChatBackend;

/// Delivers notifications to one configured room.
///
/// Delivery is at-most-once: a failed send is logged and the notification
/// is dropped.
pub struct NotificationSender<C> {
    chat: Arc<C>,
    room_id: String,
    health: Arc<HealthMonitor>,
}

impl<C: ChatBackend> NotificationSender<C> {
    pub fn new(chat: Arc<C>, room_id: impl Into<String>, health: Arc<HealthMonitor>) -> Self {
        Self {
            chat,
            room_id: room_id.into(),
            health,
        }
    }

    /// Send a notification. Returns whether it was delivered.
    pub async fn send(&self, notification: &Notification) -> bool {
        match self.chat.send_message(&self.room_id, notification).await {
            Ok(event_id) => {
                self.health.touch(Category::Delivery);
                counter!(killwatch_core::metrics::NOTIFICATIONS_SENT_TOTAL).increment(1);
                tracing::debug!(room_id = %self.room_id, %event_id, "notification delivered");
                true
            }
            Err(e) => {
                counter!(killwatch_core::metrics::NOTIFICATIONS_FAILED_TOTAL).increment(1);
                tracing::warn!(room_id = %self.room_id, error = %e, "failed to deliver notification");
                false
            }
        }
    }
}
