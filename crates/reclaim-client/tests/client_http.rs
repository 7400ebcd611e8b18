//! Loopback tests: run a real axum server on an ephemeral port and point the
//! client at it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use uuid::Uuid;

use reclaim_client::{ApiClient, ClientError};
use reclaim_types::models::Session;

#[derive(Clone, Default)]
struct Recorded {
    auth_headers: Arc<Mutex<Vec<String>>>,
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, token: &str) -> ApiClient {
    ApiClient::new(
        format!("http://{addr}"),
        Session {
            user_id: Uuid::new_v4(),
            token: token.to_string(),
        },
    )
}

#[tokio::test]
async fn history_request_carries_bearer_token_and_parses_mixed_shapes() {
    let recorded = Recorded::default();

    async fn history(
        State(recorded): State<Recorded>,
        headers: HeaderMap,
    ) -> Json<serde_json::Value> {
        if let Some(auth) = headers.get("authorization") {
            recorded
                .auth_headers
                .lock()
                .unwrap()
                .push(auth.to_str().unwrap().to_string());
        }
        let sender = Uuid::new_v4();
        Json(serde_json::json!([{
            "id": Uuid::new_v4(),
            "sender": { "id": sender, "name": "Marta" },
            "receiver": Uuid::new_v4(),
            "item": Uuid::new_v4(),
            "content": "I think that's my scarf",
            "createdAt": "2026-03-01T18:00:00Z",
            "isRead": true,
        }]))
    }

    let app = Router::new()
        .route("/messages/conversation/{item}/{user}", get(history))
        .with_state(recorded.clone());
    let addr = serve(app).await;

    let client = client_for(addr, "tok-123");
    let messages = client
        .conversation_history(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender.display_name.as_deref(), Some("Marta"));
    assert!(messages[0].is_read);
    assert_eq!(
        recorded.auth_headers.lock().unwrap().as_slice(),
        ["Bearer tok-123"]
    );
}

#[tokio::test]
async fn non_2xx_maps_to_status_error() {
    let app = Router::new().route(
        "/notifications",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let addr = serve(app).await;

    let client = client_for(addr, "tok");
    match client.notifications().await {
        Err(ClientError::Status { status, path }) => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(path, "/notifications");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unread_count_endpoints_parse() {
    let app = Router::new()
        .route(
            "/messages/unread/count",
            get(|| async { Json(serde_json::json!({ "count": 7 })) }),
        )
        .route(
            "/messages/unread/{item}/{user}",
            get(|| async { Json(serde_json::json!({ "unreadCount": 3 })) }),
        );
    let addr = serve(app).await;

    let client = client_for(addr, "tok");
    assert_eq!(client.global_unread_count().await.unwrap(), 7);
    assert_eq!(
        client
            .item_unread_count(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn mark_read_put_succeeds_with_empty_body() {
    let hits = Arc::new(Mutex::new(0u32));
    let hits_clone = hits.clone();

    let app = Router::new().route(
        "/messages/mark-read/{item}/{user}",
        put(move || {
            let hits = hits_clone.clone();
            async move {
                *hits.lock().unwrap() += 1;
                StatusCode::OK
            }
        }),
    );
    let addr = serve(app).await;

    let client = client_for(addr, "tok");
    client
        .mark_conversation_read(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn status_error_display_names_the_path() {
    // The Display impl is what surfaces in logs.
    let err = ClientError::Status {
        status: StatusCode::BAD_GATEWAY,
        path: "/messages/unread/count".into(),
    };
    assert_eq!(
        err.to_string(),
        "server returned 502 Bad Gateway for /messages/unread/count"
    );
}
