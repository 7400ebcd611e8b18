//! Thin authenticated HTTP client for the Reclaim REST API.
//!
//! Every request carries the session's bearer token. Responses are JSON.
//! Failures collapse into [`ClientError`]: either the transport failed or
//! the server answered non-2xx. Nothing here retries.

use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use reclaim_types::api::{ItemUnreadResponse, UnreadCountResponse};
use reclaim_types::models::{Message, Notification, Session};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {status} for {path}")]
    Status { status: StatusCode, path: String },
}

/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Ordered history (oldest first) of the two-party thread for one item.
    pub async fn conversation_history(
        &self,
        item_id: Uuid,
        counterpart_id: Uuid,
    ) -> Result<Vec<Message>, ClientError> {
        self.get_json(&format!("/messages/conversation/{item_id}/{counterpart_id}"))
            .await
    }

    /// All messages for an item across every counterpart (owner inbox).
    pub async fn item_conversations(&self, item_id: Uuid) -> Result<Vec<Message>, ClientError> {
        self.get_json(&format!("/messages/item/{item_id}")).await
    }

    /// Mark the whole (item, counterpart) thread read. No response body.
    pub async fn mark_conversation_read(
        &self,
        item_id: Uuid,
        counterpart_id: Uuid,
    ) -> Result<(), ClientError> {
        let path = format!("/messages/mark-read/{item_id}/{counterpart_id}");
        let resp = self
            .http
            .put(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.session.token))
            .send()
            .await?;
        self.check_status(&path, resp)?;
        Ok(())
    }

    /// Total unread messages for the current user, across all items.
    pub async fn global_unread_count(&self) -> Result<u64, ClientError> {
        let body: UnreadCountResponse = self.get_json("/messages/unread/count").await?;
        Ok(body.count)
    }

    /// Unread messages from one counterpart on one item.
    pub async fn item_unread_count(
        &self,
        item_id: Uuid,
        counterpart_id: Uuid,
    ) -> Result<u64, ClientError> {
        let body: ItemUnreadResponse = self
            .get_json(&format!("/messages/unread/{item_id}/{counterpart_id}"))
            .await?;
        Ok(body.unread_count)
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.get_json("/notifications").await
    }

    pub async fn mark_notification_read(&self, notification_id: Uuid) -> Result<(), ClientError> {
        let path = format!("/notifications/{notification_id}/read");
        let resp = self
            .http
            .put(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.session.token))
            .send()
            .await?;
        self.check_status(&path, resp)?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ClientError> {
        debug!("GET {}", path);
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.session.token))
            .send()
            .await?;
        let resp = self.check_status(path, resp)?;
        Ok(resp.json().await?)
    }

    fn check_status(
        &self,
        path: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(ClientError::Status {
                status: resp.status(),
                path: path.to_string(),
            })
        }
    }
}
