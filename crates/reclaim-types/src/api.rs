use serde::{Deserialize, Serialize};

// -- Unread counts --

/// Body of `GET /messages/unread/count`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

/// Body of `GET /messages/unread/{item}/{counterpart}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUnreadResponse {
    pub unread_count: u64,
}
