//! Two-party conversation view for one (item, counterpart) pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use reclaim_gateway::ScopeHandle;
use reclaim_types::events::{GatewayCommand, GatewayEvent};
use reclaim_types::models::Message;

use crate::SyncError;
use crate::context::SyncContext;

/// Whether an inbound message belongs to the view scoped to `item_id`
/// between `me` and `counterpart`. Both checks must pass: the message's
/// item is the open scope, and its unordered {sender, receiver} pair is
/// exactly {me, counterpart}. Anything else is silently dropped, never
/// queued or replayed.
pub fn event_matches(item_id: Uuid, me: Uuid, counterpart: Uuid, message: &Message) -> bool {
    message.item_id == item_id && message.involves_pair(me, counterpart)
}

/// Render-ready snapshot of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Oldest first. Append-only between loads; a message delivered by both
    /// the fetch and a racing event shows up twice.
    pub messages: Vec<Message>,
    /// Derived from the first fetched message; `None` until a non-empty
    /// history arrives.
    pub counterpart_name: Option<String>,
    pub loading: bool,
    pub failed: bool,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            counterpart_name: None,
            loading: true,
            failed: false,
        }
    }
}

impl ConversationState {
    /// Replace the whole list with a fresh snapshot and derive the
    /// counterpart's display name from the first message, picking whichever
    /// side is not the current user.
    pub fn apply_history(&mut self, current_user: Uuid, history: Vec<Message>) {
        self.counterpart_name = history.first().map(|first| {
            first
                .counterpart_of(current_user)
                .display_name
                .clone()
                .unwrap_or_else(|| "User".to_string())
        });
        self.messages = history;
        self.loading = false;
        self.failed = false;
    }

    pub fn apply_failure(&mut self) {
        self.loading = false;
        self.failed = true;
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }
}

struct ViewInner {
    ctx: Arc<SyncContext>,
    item_id: Uuid,
    counterpart_id: Uuid,
    state: Mutex<ConversationState>,
    alive: AtomicBool,
}

impl ViewInner {
    async fn load_history(&self) {
        let result = self
            .ctx
            .api
            .conversation_history(self.item_id, self.counterpart_id)
            .await;

        // The request was not cancelled on close; its completion must be a
        // no-op once the view is gone.
        if !self.alive.load(Ordering::Relaxed) {
            return;
        }

        match result {
            Ok(history) => {
                let me = self.ctx.session().user_id;
                self.state
                    .lock()
                    .expect("conversation state lock poisoned")
                    .apply_history(me, history);
                self.ctx.spawn_mark_read(self.item_id, self.counterpart_id);
            }
            Err(err) => {
                warn!("conversation history load failed: {}", err);
                self.state
                    .lock()
                    .expect("conversation state lock poisoned")
                    .apply_failure();
            }
        }
    }

    fn handle_event(&self, event: GatewayEvent) {
        if !self.alive.load(Ordering::Relaxed) {
            return;
        }
        let GatewayEvent::ReceiveMessage(message) = event else {
            return;
        };
        let me = self.ctx.session().user_id;
        if !event_matches(self.item_id, me, self.counterpart_id, &message) {
            return;
        }

        let from_counterpart = message.sender.id == self.counterpart_id;
        self.state
            .lock()
            .expect("conversation state lock poisoned")
            .append(message);

        // The other party wrote while this view is open: their message is
        // already on screen, so mark it read right away.
        if from_counterpart {
            self.ctx.spawn_mark_read(self.item_id, self.counterpart_id);
        }
    }
}

/// A live conversation view. Opening fetches history and subscribes to the
/// event stream; closing (or dropping) detaches the event handler and turns
/// any still-in-flight completion into a no-op.
pub struct ConversationView {
    inner: Arc<ViewInner>,
    scope: Option<ScopeHandle>,
    events_task: Option<JoinHandle<()>>,
}

impl ConversationView {
    pub fn open(ctx: Arc<SyncContext>, item_id: Uuid, counterpart_id: Uuid) -> Self {
        let scope = ctx.gateway.join_scope(item_id);
        let mut events = ctx.gateway.subscribe();

        let inner = Arc::new(ViewInner {
            ctx,
            item_id,
            counterpart_id,
            state: Mutex::new(ConversationState::default()),
            alive: AtomicBool::new(true),
        });

        let load_inner = inner.clone();
        tokio::spawn(async move {
            load_inner.load_history().await;
        });

        let event_inner = inner.clone();
        let events_task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => event_inner.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("conversation view lagged, skipped {} events", skipped);
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

    pub fn counterpart_id(&self) -> Uuid {
        self.inner.counterpart_id
    }

    pub fn snapshot(&self) -> ConversationState {
        self.inner
            .state
            .lock()
            .expect("conversation state lock poisoned")
            .clone()
    }

    /// Post a message over the event channel. No acknowledgement and no
    /// local echo: the message appears in this view only when the server
    /// broadcasts it back.
    pub fn send(&self, text: &str) -> Result<(), SyncError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(SyncError::Validation("message text is empty"));
        }
        let session = self.inner.ctx.session();
        self.inner.ctx.gateway.send(GatewayCommand::SendMessage {
            sender: session.user_id,
            receiver: self.inner.counterpart_id,
            item_id: self.inner.item_id,
            content: content.to_string(),
        })?;
        Ok(())
    }

    /// Detach from the event stream. Idempotent. The in-flight history
    /// request (if any) is left to finish and discard itself against the
    /// dead liveness flag.
    pub fn close(&mut self) {
        self.inner.alive.store(false, Ordering::Relaxed);
        if let Some(task) = self.events_task.take() {
            task.abort();
        }
        self.scope.take();
    }
}

impl Drop for ConversationView {
    fn drop(&mut self) {
        self.close();
    }
}
