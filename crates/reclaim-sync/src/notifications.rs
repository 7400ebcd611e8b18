//! Notification bell: flat arrival-ordered feed with a derived unread count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use reclaim_types::events::GatewayEvent;
use reclaim_types::models::Notification;

use crate::context::SyncContext;

/// Where clicking a notification should take the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationTarget {
    pub item_id: Uuid,
    pub counterpart_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationFeedState {
    /// Arrival order: live events go to the front regardless of their
    /// timestamp relative to what is already here.
    pub notifications: Vec<Notification>,
    pub loading: bool,
    pub failed: bool,
}

impl NotificationFeedState {
    pub fn prepend(&mut self, notification: Notification) {
        self.notifications.insert(0, notification);
    }

    /// Purely derived; never stored independently, so it cannot drift
    /// negative or disagree with the list.
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}

struct FeedInner {
    ctx: Arc<SyncContext>,
    state: Mutex<NotificationFeedState>,
    alive: AtomicBool,
}

impl FeedInner {
    async fn load(&self) {
        let result = self.ctx.api.notifications().await;
        if !self.alive.load(Ordering::Relaxed) {
            return;
        }
        let mut state = self.state.lock().expect("notification state lock poisoned");
        match result {
            Ok(notifications) => {
                state.notifications = notifications;
                state.loading = false;
                state.failed = false;
            }
            Err(err) => {
                warn!("notification load failed: {}", err);
                state.loading = false;
                state.failed = true;
            }
        }
    }

    fn handle_event(&self, event: GatewayEvent) {
        if !self.alive.load(Ordering::Relaxed) {
            return;
        }
        if let GatewayEvent::NewNotification(notification) = event {
            self.state
                .lock()
                .expect("notification state lock poisoned")
                .prepend(notification);
        }
    }
}

/// Live notification feed. The server targets notifications to the
/// connected user, so there is no scope join here.
pub struct NotificationFeed {
    inner: Arc<FeedInner>,
    events_task: Option<JoinHandle<()>>,
}

impl NotificationFeed {
    pub fn open(ctx: Arc<SyncContext>) -> Self {
        let mut events = ctx.gateway.subscribe();

        let inner = Arc::new(FeedInner {
            ctx,
            state: Mutex::new(NotificationFeedState {
                loading: true,
                ..Default::default()
            }),
            alive: AtomicBool::new(true),
        });

        let load_inner = inner.clone();
        tokio::spawn(async move {
            load_inner.load().await;
        });

        let event_inner = inner.clone();
        let events_task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => event_inner.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("notification feed lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            inner,
            events_task: Some(events_task),
        }
    }

    pub fn snapshot(&self) -> NotificationFeedState {
        self.inner
            .state
            .lock()
            .expect("notification state lock poisoned")
            .clone()
    }

    /// Handle a click: flip the notification read locally right away, fire
    /// the mark-read request without waiting on it, and hand back where to
    /// navigate. The local flip is never rolled back, even if the request
    /// fails. Returns `None` for an id not in the feed.
    pub fn mark_read(&self, notification_id: Uuid) -> Option<ConversationTarget> {
        let target = {
            let mut state = self.inner.state.lock().expect("notification state lock poisoned");
            let notification = state
                .notifications
                .iter_mut()
                .find(|n| n.id == notification_id)?;
            notification.is_read = true;
            ConversationTarget {
                item_id: notification.item.id,
                counterpart_id: notification.sender.id,
            }
        };

        let ctx = self.inner.ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = ctx.api.mark_notification_read(notification_id).await {
                warn!("notification mark-read failed: {}", err);
            }
        });

        Some(target)
    }

    /// Detach from the event stream. Idempotent.
    pub fn close(&mut self) {
        self.inner.alive.store(false, Ordering::Relaxed);
        if let Some(task) = self.events_task.take() {
            task.abort();
        }
    }
}

impl Drop for NotificationFeed {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use reclaim_types::models::{ItemRef, UserRef};

    fn notification(offset_secs: i64, is_read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            sender: UserRef::bare(Uuid::new_v4()),
            item: ItemRef {
                id: Uuid::new_v4(),
                title: None,
            },
            created_at: Utc::now() + Duration::seconds(offset_secs),
            is_read,
        }
    }

    #[test]
    fn live_notifications_are_prepended_regardless_of_timestamp() {
        let mut state = NotificationFeedState::default();
        let existing = notification(100, false);
        let existing_id = existing.id;
        state.notifications = vec![existing];

        // Older timestamp than what's already present: still goes first.
        let late_arrival = notification(0, false);
        let late_id = late_arrival.id;
        state.prepend(late_arrival);

        assert_eq!(state.notifications[0].id, late_id);
        assert_eq!(state.notifications[1].id, existing_id);
        assert_eq!(state.unread_count(), 2);
    }

    #[test]
    fn unread_count_is_derived_from_read_flags() {
        let mut state = NotificationFeedState::default();
        state.notifications = vec![
            notification(0, true),
            notification(1, false),
            notification(2, true),
        ];
        assert_eq!(state.unread_count(), 1);

        for n in &mut state.notifications {
            n.is_read = true;
        }
        assert_eq!(state.unread_count(), 0);
    }
}
