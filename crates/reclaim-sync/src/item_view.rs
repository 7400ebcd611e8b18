//! Item-owner inbox: every conversation about one item, grouped by
//! counterpart.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use reclaim_gateway::ScopeHandle;
use reclaim_types::events::GatewayEvent;
use reclaim_types::models::{ConversationSummary, Message};

use crate::context::SyncContext;

/// Group a flat message list into one summary per counterpart.
///
/// Iteration order of the result is first-encounter order, not
/// chronological. Within a group, the summary keeps whichever message has
/// the strictly latest `created_at`; on a tie the earlier-seen message
/// stands. The counterpart reference itself is taken from the first
/// encounter (later messages may carry a richer or poorer wire shape; the
/// first one wins).
pub fn group_by_counterpart(messages: &[Message], current_user: Uuid) -> Vec<ConversationSummary> {
    let mut summaries: Vec<ConversationSummary> = Vec::new();
    for message in messages {
        let other = message.counterpart_of(current_user);
        match summaries.iter_mut().find(|s| s.counterpart.id == other.id) {
            None => summaries.push(ConversationSummary {
                counterpart: other.clone(),
                last_message: message.content.clone(),
                last_activity: message.created_at,
            }),
            Some(existing) => {
                if message.created_at > existing.last_activity {
                    existing.last_message = message.content.clone();
                    existing.last_activity = message.created_at;
                }
            }
        }
    }
    summaries
}

/// Render-ready snapshot of the owner inbox.
#[derive(Debug, Clone)]
pub struct ItemInboxState {
    pub conversations: Vec<ConversationSummary>,
    /// Advisory per-counterpart unread counts. Absent entries render as
    /// zero. Only incremented on live events or replaced by a re-fetch,
    /// never decremented client-side.
    pub unread: HashMap<Uuid, u64>,
    /// Latest full replacement set from `online-users-update`.
    pub online: HashSet<Uuid>,
    pub loading: bool,
    pub failed: bool,
}

impl Default for ItemInboxState {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            unread: HashMap::new(),
            online: HashSet::new(),
            loading: true,
            failed: false,
        }
    }
}

impl ItemInboxState {
    pub fn unread_for(&self, counterpart: Uuid) -> u64 {
        self.unread.get(&counterpart).copied().unwrap_or(0)
    }

    /// Fold a live message into the grouped view: update the counterpart's
    /// summary under the same strictly-later rule as the initial grouping,
    /// or prepend a new summary for a first-time counterpart. Messages from
    /// anyone but the current user bump that counterpart's unread count.
    pub fn apply_live_message(&mut self, current_user: Uuid, message: &Message) {
        let other = message.counterpart_of(current_user);
        match self
            .conversations
            .iter_mut()
            .find(|c| c.counterpart.id == other.id)
        {
            Some(existing) => {
                if message.created_at > existing.last_activity {
                    existing.last_message = message.content.clone();
                    existing.last_activity = message.created_at;
                }
            }
            None => self.conversations.insert(
                0,
                ConversationSummary {
                    counterpart: other.clone(),
                    last_message: message.content.clone(),
                    last_activity: message.created_at,
                },
            ),
        }

        if message.sender.id != current_user {
            *self.unread.entry(other.id).or_insert(0) += 1;
        }
    }

    fn apply_failure(&mut self) {
        self.loading = false;
        self.failed = true;
    }
}

struct InboxInner {
    ctx: Arc<SyncContext>,
    item_id: Uuid,
    state: Mutex<ItemInboxState>,
    alive: AtomicBool,
}

impl InboxInner {
    async fn load(self: Arc<Self>) {
        let result = self.ctx.api.item_conversations(self.item_id).await;
        if !self.alive.load(Ordering::Relaxed) {
            return;
        }

        let messages = match result {
            Ok(messages) => messages,
            Err(err) => {
                warn!("item conversations load failed: {}", err);
                self.state
                    .lock()
                    .expect("inbox state lock poisoned")
                    .apply_failure();
                return;
            }
        };

        let me = self.ctx.session().user_id;
        let summaries = group_by_counterpart(&messages, me);
        let counterparts: Vec<Uuid> = summaries.iter().map(|s| s.counterpart.id).collect();
        {
            let mut state = self.state.lock().expect("inbox state lock poisoned");
            state.conversations = summaries;
            state.loading = false;
            state.failed = false;
        }

        // One unread request per counterpart: N counterparts, N round trips.
        // A failed request leaves no entry, which renders as zero.
        for counterpart in counterparts {
            let inner = self.clone();
            tokio::spawn(async move {
                match inner
                    .ctx
                    .api
                    .item_unread_count(inner.item_id, counterpart)
                    .await
                {
                    Ok(count) => {
                        if inner.alive.load(Ordering::Relaxed) {
                            inner
                                .state
                                .lock()
                                .expect("inbox state lock poisoned")
                                .unread
                                .insert(counterpart, count);
                        }
                    }
                    Err(err) => warn!("unread count for {} failed: {}", counterpart, err),
                }
            });
        }
    }

    fn handle_event(&self, event: GatewayEvent) {
        if !self.alive.load(Ordering::Relaxed) {
            return;
        }
        match event {
            GatewayEvent::ReceiveMessage(message) => {
                if message.item_id != self.item_id {
                    return;
                }
                let me = self.ctx.session().user_id;
                self.state
                    .lock()
                    .expect("inbox state lock poisoned")
                    .apply_live_message(me, &message);
            }
            GatewayEvent::OnlineUsersUpdate(users) => {
                self.state
                    .lock()
                    .expect("inbox state lock poisoned")
                    .online = users.into_iter().collect();
            }
            GatewayEvent::NewNotification(_) => {}
        }
    }
}

/// Live owner-inbox view for one item.
pub struct ItemConversationsView {
    inner: Arc<InboxInner>,
    scope: Option<ScopeHandle>,
    events_task: Option<JoinHandle<()>>,
}

impl ItemConversationsView {
    pub fn open(ctx: Arc<SyncContext>, item_id: Uuid) -> Self {
        let scope = ctx.gateway.join_scope(item_id);
        let mut events = ctx.gateway.subscribe();

        let inner = Arc::new(InboxInner {
            ctx,
            item_id,
            state: Mutex::new(ItemInboxState::default()),
            alive: AtomicBool::new(true),
        });

        let load_inner = inner.clone();
        tokio::spawn(load_inner.load());

        let event_inner = inner.clone();
        let events_task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => event_inner.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("inbox view lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            inner,
            scope: Some(scope),
            events_task: Some(events_task),
        }
    }

    pub fn item_id(&self) -> Uuid {
        self.inner.item_id
    }

    pub fn snapshot(&self) -> ItemInboxState {
        self.inner
            .state
            .lock()
            .expect("inbox state lock poisoned")
            .clone()
    }

    /// Detach from the event stream. Idempotent.
    pub fn close(&mut self) {
        self.inner.alive.store(false, Ordering::Relaxed);
        if let Some(task) = self.events_task.take() {
            task.abort();
        }
        self.scope.take();
    }
}

impl Drop for ItemConversationsView {
    fn drop(&mut self) {
        self.close();
    }
}
