//! Process-wide event-channel connection manager.
//!
//! One websocket connection is shared by every view in the process. Views
//! subscribe to a broadcast of decoded inbound events and filter locally;
//! outbound commands funnel through a single writer task. Scope joins are
//! reference-counted so the join command is emitted once per scope no matter
//! how many views look at it. The wire protocol has no "leave" event, so
//! releasing the last reference sends nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use reclaim_types::events::{GatewayCommand, GatewayEvent};
use reclaim_types::models::Session;

/// Inbound events that arrive while no view is listening are dropped once
/// this many are buffered per receiver.
const EVENT_BUFFER: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("event channel connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("event channel is not connected")]
    NotConnected,
}

/// Handle to the shared connection. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    events_tx: broadcast::Sender<GatewayEvent>,
    link: Mutex<Option<Link>>,
    /// scope id -> number of live [`ScopeHandle`]s
    scopes: Mutex<HashMap<Uuid, usize>>,
}

struct Link {
    command_tx: mpsc::UnboundedSender<GatewayCommand>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(GatewayInner {
                events_tx,
                link: Mutex::new(None),
                scopes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Dial the event channel, announce presence, and re-join every scope
    /// that already has live handles.
    ///
    /// Calling `connect` while connected replaces the old link; its tasks
    /// are stopped first.
    pub async fn connect(&self, url: &str, session: &Session) -> Result<(), GatewayError> {
        let (ws, _) = connect_async(url).await?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        info!("event channel connected to {}", url);

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<GatewayCommand>();

        let writer = tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                let frame = match serde_json::to_string(&cmd) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!("dropping unserializable command: {}", err);
                        continue;
                    }
                };
                if let Err(err) = ws_tx.send(WsMessage::Text(frame)).await {
                    warn!("event channel send failed: {}", err);
                    break;
                }
            }
        });

        let events_tx = self.inner.events_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!("event channel read failed: {}", err);
                        break;
                    }
                };
                match frame {
                    WsMessage::Text(text) => match serde_json::from_str::<GatewayEvent>(&text) {
                        Ok(event) => {
                            trace!("inbound event: {:?}", event);
                            // No receivers is fine; views come and go.
                            let _ = events_tx.send(event);
                        }
                        Err(err) => debug!("ignoring unrecognized frame: {}", err),
                    },
                    WsMessage::Close(_) => {
                        info!("event channel closed by server");
                        break;
                    }
                    _ => {}
                }
            }
        });

        let _ = command_tx.send(GatewayCommand::AnnouncePresence(session.user_id));
        for scope in self.referenced_scopes() {
            let _ = command_tx.send(GatewayCommand::JoinScope(scope));
        }

        let old = self.inner.link.lock().expect("gateway link lock poisoned").replace(Link {
            command_tx,
            reader,
            writer,
        });
        if let Some(old) = old {
            old.reader.abort();
            old.writer.abort();
        }

        Ok(())
    }

    /// Drop the link and stop its tasks. Subscribers keep their receivers
    /// and simply see no further events.
    pub fn disconnect(&self) {
        if let Some(link) = self.inner.link.lock().expect("gateway link lock poisoned").take() {
            link.reader.abort();
            link.writer.abort();
            info!("event channel disconnected");
        }
    }

    /// Subscribe to all decoded inbound events. Filtering is the caller's
    /// job.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Queue a command for the writer task.
    pub fn send(&self, command: GatewayCommand) -> Result<(), GatewayError> {
        let link = self.inner.link.lock().expect("gateway link lock poisoned");
        match link.as_ref() {
            Some(link) => link
                .command_tx
                .send(command)
                .map_err(|_| GatewayError::NotConnected),
            None => Err(GatewayError::NotConnected),
        }
    }

    /// Take a reference-counted interest in a scope. The join command goes
    /// out on the 0 -> 1 transition only (and again on reconnect).
    pub fn join_scope(&self, scope: Uuid) -> ScopeHandle {
        let first = {
            let mut scopes = self.inner.scopes.lock().expect("gateway scope lock poisoned");
            let count = scopes.entry(scope).or_insert(0);
            *count += 1;
            *count == 1
        };

        if first {
            if let Err(err) = self.send(GatewayCommand::JoinScope(scope)) {
                // Not connected yet: connect() replays joins for live scopes.
                debug!("deferred join for scope {}: {}", scope, err);
            }
        }

        ScopeHandle {
            gateway: self.clone(),
            scope,
        }
    }

    fn referenced_scopes(&self) -> Vec<Uuid> {
        self.inner
            .scopes
            .lock()
            .expect("gateway scope lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    fn release_scope(&self, scope: Uuid) {
        let mut scopes = self.inner.scopes.lock().expect("gateway scope lock poisoned");
        if let Some(count) = scopes.get_mut(&scope) {
            *count -= 1;
            if *count == 0 {
                scopes.remove(&scope);
            }
        }
    }
}

/// RAII interest in a scope. Dropping releases the reference; nothing is
/// sent on the wire (the protocol has no leave event).
pub struct ScopeHandle {
    gateway: Gateway,
    scope: Uuid,
}

impl ScopeHandle {
    pub fn scope(&self) -> Uuid {
        self.scope
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        self.gateway.release_scope(self.scope);
    }
}
