//! End-to-end tests: WebSocket clients on two server instances sharing one bus.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use boardsync_server::bus::{MemoryBus, MessageBus};
use boardsync_server::{gateway, hub};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start one server instance on a random port, attached to `bus`.
async fn start_instance(bus: Arc<dyn MessageBus>) -> SocketAddr {
    let hub = hub::start(bus).await.expect("Failed to start hub");
    let app = gateway::router(hub, None);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect");
    client
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn next_push(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), client.next())
            .await
            .expect("Timed out waiting for push")
            .expect("Connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Register and consume the `user-info` + `init-board` bootstrap.
async fn register(client: &mut Client, user_id: Option<&str>) -> (String, Value) {
    let data = match user_id {
        Some(id) => json!({"userId": id}),
        None => json!({}),
    };
    send(client, json!({"event": "register", "data": data})).await;

    let info = next_push(client).await;
    assert_eq!(info["event"], "user-info");
    let board = next_push(client).await;
    assert_eq!(board["event"], "init-board");
    (info["data"]["userId"].as_str().unwrap().to_string(), board["data"].clone())
}

#[tokio::test]
async fn test_health() {
    let addr = start_instance(Arc::new(MemoryBus::new("health"))).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}

#[tokio::test]
async fn test_register_assigns_derived_user_id() {
    let addr = start_instance(Arc::new(MemoryBus::new("derive"))).await;
    let mut client = connect(addr).await;

    let (user_id, board) = register(&mut client, None).await;
    assert_eq!(user_id.len(), 5);
    assert_eq!(user_id, user_id.to_uppercase());
    assert_eq!(board, json!([]));
}

#[tokio::test]
async fn test_draw_reaches_clients_on_both_instances() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new("draw"));
    let first = start_instance(bus.clone()).await;
    let second = start_instance(bus).await;

    let mut a = connect(first).await;
    let mut b = connect(second).await;
    register(&mut a, Some("AAAA")).await;
    register(&mut b, Some("BBBB")).await;

    send(&mut a, json!({"event": "draw", "data": {"x": 1, "y": 1, "color": "red"}})).await;

    let expected = json!({"event": "draw", "data": {"x": 1, "y": 1, "color": "red", "userId": "AAAA"}});
    assert_eq!(next_push(&mut a).await, expected);
    assert_eq!(next_push(&mut b).await, expected);
}

#[tokio::test]
async fn test_clear_mine_resets_every_board() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new("clear-mine"));
    let first = start_instance(bus.clone()).await;
    let second = start_instance(bus).await;

    let mut a = connect(first).await;
    let mut b = connect(second).await;
    let (a_id, _) = register(&mut a, None).await;
    register(&mut b, Some("BBBB")).await;

    for frame in [
        json!({"event": "draw", "data": {"x": 1}}),
        json!({"event": "draw", "data": {"x": 2}}),
    ] {
        send(&mut a, frame).await;
        next_push(&mut a).await;
        next_push(&mut b).await;
    }
    send(&mut b, json!({"event": "draw", "data": {"x": 3}})).await;
    next_push(&mut a).await;
    next_push(&mut b).await;

    send(&mut a, json!({"event": "clear-mine"})).await;
    for client in [&mut a, &mut b] {
        assert_eq!(
            next_push(client).await,
            json!({"event": "clear-user", "data": {"userId": a_id}})
        );
        assert_eq!(
            next_push(client).await,
            json!({"event": "reset-board", "data": [{"x": 3, "userId": "BBBB"}]})
        );
    }
}

#[tokio::test]
async fn test_late_joiner_and_clear_all() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new("late"));
    let first = start_instance(bus.clone()).await;
    let second = start_instance(bus).await;

    let mut a = connect(first).await;
    register(&mut a, Some("AAAA")).await;
    send(&mut a, json!({"event": "draw", "data": {"x": 7}})).await;
    next_push(&mut a).await;

    // Registering again resends the board; repeat until the second instance
    // has applied the same bus message.
    let mut late = connect(second).await;
    let board = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let (_, board) = register(&mut late, Some("LATE")).await;
            if board != json!([]) {
                return board;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("Second instance never applied the draw");
    assert_eq!(board, json!([{"x": 7, "userId": "AAAA"}]));

    send(&mut late, json!({"event": "clear-all"})).await;
    assert_eq!(next_push(&mut a).await, json!({"event": "clear-all"}));
    assert_eq!(next_push(&mut late).await, json!({"event": "clear-all"}));
}

#[tokio::test]
async fn test_invalid_frames_are_ignored() {
    let addr = start_instance(Arc::new(MemoryBus::new("invalid"))).await;
    let mut client = connect(addr).await;

    client.send(Message::Text("not json".to_string().into())).await.unwrap();
    send(&mut client, json!({"event": "undo"})).await;
    send(&mut client, json!({"event": "draw", "data": "scribble"})).await;

    // The connection stays usable
    let (user_id, _) = register(&mut client, Some("STILL")).await;
    assert_eq!(user_id, "STILL");
}
