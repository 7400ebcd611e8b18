use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Notification};

/// Events received over the event channel.
///
/// Frames are JSON envelopes `{"type": "<kebab-name>", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayEvent {
    /// A message was posted to a conversation this client can see.
    ReceiveMessage(Message),

    /// A notification was created for this user.
    NewNotification(Notification),

    /// Full replacement set of currently online user ids.
    OnlineUsersUpdate(Vec<Uuid>),
}

impl GatewayEvent {
    /// Returns the item id this event is scoped to, if any.
    /// Events that return `None` are global and apply to every view.
    pub fn scope_id(&self) -> Option<Uuid> {
        match self {
            Self::ReceiveMessage(msg) => Some(msg.item_id),
            Self::NewNotification(notif) => Some(notif.item.id),
            Self::OnlineUsersUpdate(_) => None,
        }
    }
}

/// Commands sent FROM client TO server over the event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum GatewayCommand {
    /// Join the broadcast scope for an item/conversation id.
    JoinScope(Uuid),

    /// Announce the current user id so the server tracks presence.
    AnnouncePresence(Uuid),

    /// Post a message. No acknowledgement comes back; the message appears
    /// to this client only via a later `receive-message` broadcast.
    SendMessage {
        sender: Uuid,
        receiver: Uuid,
        #[serde(rename = "item")]
        item_id: Uuid,
        content: String,
    },
}
