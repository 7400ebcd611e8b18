//! Conversation and notification sync engines.
//!
//! Each view engine merges a REST snapshot with the live event stream: fetch
//! once, subscribe, filter inbound events down to the open scope, and append
//! into view-local state. Read receipts and unread-count refreshes ride along
//! as fire-and-forget side effects. State is ephemeral: created on open,
//! discarded on close, never persisted.

pub mod context;
pub mod conversation;
pub mod item_view;
pub mod notifications;
pub mod unread;

pub use context::SyncContext;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A required local precondition failed (e.g. empty message text).
    #[error("validation failed: {0}")]
    Validation(&'static str),

    #[error(transparent)]
    Client(#[from] reclaim_client::ClientError),

    #[error(transparent)]
    Gateway(#[from] reclaim_gateway::GatewayError),
}
