use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reference to a user as it appears on the wire.
///
/// The backend sends user references in two shapes depending on whether the
/// field was populated server-side: a bare id (`"3fa85f64-..."`) or an
/// embedded object (`{"id": "...", "name": "..."}`). Both deserialize into
/// this one normalized shape so nothing downstream ever branches on wire
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireUserRef", into = "WireUserRef")]
pub struct UserRef {
    pub id: Uuid,
    pub display_name: Option<String>,
}

impl UserRef {
    pub fn bare(id: Uuid) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    pub fn named(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireUserRef {
    Embedded {
        id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Bare(Uuid),
}

impl From<WireUserRef> for UserRef {
    fn from(wire: WireUserRef) -> Self {
        match wire {
            WireUserRef::Embedded { id, name } => Self {
                id,
                display_name: name,
            },
            WireUserRef::Bare(id) => Self::bare(id),
        }
    }
}

impl From<UserRef> for WireUserRef {
    fn from(user: UserRef) -> Self {
        match user.display_name {
            Some(name) => Self::Embedded {
                id: user.id,
                name: Some(name),
            },
            None => Self::Bare(user.id),
        }
    }
}

/// A reference to a listed item, normalized like [`UserRef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireItemRef", into = "WireItemRef")]
pub struct ItemRef {
    pub id: Uuid,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireItemRef {
    Embedded {
        id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Bare(Uuid),
}

impl From<WireItemRef> for ItemRef {
    fn from(wire: WireItemRef) -> Self {
        match wire {
            WireItemRef::Embedded { id, title } => Self { id, title },
            WireItemRef::Bare(id) => Self { id, title: None },
        }
    }
}

impl From<ItemRef> for WireItemRef {
    fn from(item: ItemRef) -> Self {
        match item.title {
            Some(title) => Self::Embedded {
                id: item.id,
                title: Some(title),
            },
            None => Self::Bare(item.id),
        }
    }
}

/// A single message in a two-party thread about one item.
///
/// Messages are created and owned by the backend; the client only holds
/// ephemeral copies. The only field that ever changes is `is_read`, and it
/// only flips false → true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: UserRef,
    pub receiver: UserRef,
    #[serde(rename = "item")]
    pub item_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    /// The other party of this message, relative to `user_id`.
    ///
    /// If `user_id` is the sender, returns the receiver, and vice versa.
    /// A message where neither side matches returns the sender (callers are
    /// expected to have filtered on [`Message::involves_pair`] first).
    pub fn counterpart_of(&self, user_id: Uuid) -> &UserRef {
        if self.sender.id == user_id {
            &self.receiver
        } else {
            &self.sender
        }
    }

    /// Whether the unordered {sender, receiver} pair equals the unordered
    /// {a, b} pair.
    pub fn involves_pair(&self, a: Uuid, b: Uuid) -> bool {
        (self.sender.id == a && self.receiver.id == b)
            || (self.sender.id == b && self.receiver.id == a)
    }
}

/// A notification created server-side when a message is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub sender: UserRef,
    pub item: ItemRef,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

/// Latest-message projection for one counterpart in an item's inbox.
///
/// Derived client-side by grouping messages; the server is the source of
/// truth and this may be stale.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub counterpart: UserRef,
    pub last_message: String,
    pub last_activity: DateTime<Utc>,
}

/// The authenticated identity this client acts as. Owned by the outer auth
/// layer; read-only here.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub token: String,
}
