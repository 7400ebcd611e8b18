use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use reclaim_client::ApiClient;
use reclaim_gateway::Gateway;
use reclaim_types::models::Session;

use crate::unread::UnreadCounter;

/// Everything a view engine needs: the REST client, the shared event
/// channel, and the global unread counter. One per process, shared by
/// every open view.
pub struct SyncContext {
    pub api: ApiClient,
    pub gateway: Gateway,
    pub unread: UnreadCounter,
}

impl SyncContext {
    pub fn new(api: ApiClient, gateway: Gateway) -> Arc<Self> {
        Arc::new(Self {
            api,
            gateway,
            unread: UnreadCounter::default(),
        })
    }

    pub fn session(&self) -> &Session {
        self.api.session()
    }

    /// Mark the whole (item, counterpart) thread read, then refresh the
    /// global unread counter. Fire-and-forget: failures are logged and
    /// swallowed, and nothing blocks on the result.
    pub(crate) fn spawn_mark_read(self: &Arc<Self>, item_id: Uuid, counterpart_id: Uuid) {
        let ctx = self.clone();
        tokio::spawn(async move {
            if let Err(err) = ctx.api.mark_conversation_read(item_id, counterpart_id).await {
                warn!("mark-read for item {} failed: {}", item_id, err);
            }
            ctx.unread.refresh(&ctx.api).await;
        });
    }
}
