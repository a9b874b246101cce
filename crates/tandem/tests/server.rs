//! Integration tests for the Tandem server, handler, and full connection flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tandem::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port and returns its address and registry.
async fn start_server_with(
    builder: TandemServerBuilder,
) -> (String, Arc<Registry>) {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, registry)
}

async fn start_server() -> (String, Arc<Registry>) {
    start_server_with(TandemServer::builder()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, event: Value) {
    ws.send(Message::Text(event.to_string().into()))
        .await
        .expect("send");
}

/// Waits for the next JSON event, skipping control frames.
async fn recv(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream ended")
            .expect("recv");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("decode");
            }
            Message::Binary(bytes) => {
                return serde_json::from_slice(&bytes).expect("decode");
            }
            _ => continue,
        }
    }
}

/// Asserts nothing arrives for a short while.
async fn assert_silent(ws: &mut ClientWs) {
    let result =
        tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(result.is_err(), "expected no event, got {result:?}");
}

/// Polls the registry until it tracks `expected` rooms.
async fn wait_for_room_count(registry: &Registry, expected: usize) {
    for _ in 0..100 {
        if registry.room_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry never reached {expected} rooms");
}

async fn join(ws: &mut ClientWs, room: &str) -> Value {
    send(ws, json!({"event": "joinGame", "data": room})).await;
    recv(ws).await
}

fn move_event(event: &str, room: &str, cell: u8, symbol: &str) -> Value {
    json!({
        "event": event,
        "data": {"roomKey": room, "cellIndex": cell, "symbol": symbol}
    })
}

/// Two clients seated in `room`, with the join notifications consumed.
async fn seated_pair(addr: &str, room: &str) -> (ClientWs, ClientWs) {
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    join(&mut a, room).await;
    join(&mut b, room).await;
    let notice = recv(&mut a).await;
    assert_eq!(notice["event"], "memberJoined");
    (a, b)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_two_player_session() {
    let (addr, registry) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    // A joins and waits.
    let joined = join(&mut a, "r1").await;
    assert_eq!(joined, json!({"event": "gameJoined", "data": {"roomKey": "r1"}}));

    // B joins; A learns about it.
    let joined = join(&mut b, "r1").await;
    assert_eq!(joined, json!({"event": "gameJoined", "data": {"roomKey": "r1"}}));
    let notice = recv(&mut a).await;
    assert_eq!(notice["event"], "memberJoined");
    let b_id = notice["data"]["connectionId"].clone();
    assert!(b_id.is_u64());

    // Moves reach both, the mover included.
    send(&mut a, move_event("move", "r1", 4, "X")).await;
    let expected = json!({"event": "move", "data": {"cellIndex": 4, "symbol": "X"}});
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);

    send(&mut b, move_event("move", "r1", 0, "O")).await;
    let expected = json!({"event": "move", "data": {"cellIndex": 0, "symbol": "O"}});
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);

    // Reset reaches both.
    send(&mut a, json!({"event": "resetGame", "data": "r1"})).await;
    assert_eq!(recv(&mut a).await, json!({"event": "resetGame"}));
    assert_eq!(recv(&mut b).await, json!({"event": "resetGame"}));

    // B disconnects; A is told, and the room stays open for A.
    b.close(None).await.expect("close");
    let left = recv(&mut a).await;
    assert_eq!(left["event"], "memberLeft");
    assert_eq!(left["data"]["connectionId"], b_id);
    assert_eq!(
        registry.room_info(&RoomKey::from("r1")).await.unwrap().phase,
        RoomPhase::Waiting
    );

    // A disconnects; the room is gone.
    a.close(None).await.expect("close");
    wait_for_room_count(&registry, 0).await;
}

#[tokio::test]
async fn test_third_client_gets_room_full() {
    let (addr, _registry) = start_server().await;
    let (mut a, mut b) = seated_pair(&addr, "r1").await;
    let mut c = connect(&addr).await;

    let refused = join(&mut c, "r1").await;

    assert_eq!(refused["event"], "error");
    assert_eq!(refused["data"]["reason"], "roomFull");
    assert!(refused["data"]["message"].is_string());
    assert_silent(&mut a).await;
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_move_to_unknown_room() {
    let (addr, _registry) = start_server().await;
    let mut a = connect(&addr).await;

    send(&mut a, move_event("move", "nope", 0, "X")).await;
    let refused = recv(&mut a).await;

    assert_eq!(refused["event"], "error");
    assert_eq!(refused["data"]["reason"], "unknownRoom");
}

#[tokio::test]
async fn test_move_into_someone_elses_room() {
    let (addr, _registry) = start_server().await;
    let mut a = connect(&addr).await;
    let mut outsider = connect(&addr).await;
    join(&mut a, "r1").await;

    send(&mut outsider, move_event("move", "r1", 0, "X")).await;
    let refused = recv(&mut outsider).await;

    assert_eq!(refused["data"]["reason"], "notMember");
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let (addr, _registry) = start_server().await;
    let mut a = connect(&addr).await;

    a.send(Message::Text("not json".into())).await.expect("send");
    send(&mut a, json!({"event": "chat", "data": "hi"})).await;
    send(&mut a, move_event("move", "r1", 0, "Z")).await;

    // The connection is still usable.
    let joined = join(&mut a, "r1").await;
    assert_eq!(joined["event"], "gameJoined");
}

#[tokio::test]
async fn test_binary_frames_are_decoded_too() {
    let (addr, _registry) = start_server().await;
    let mut a = connect(&addr).await;

    let frame = json!({"event": "joinGame", "data": "r1"}).to_string();
    a.send(Message::Binary(frame.into_bytes().into()))
        .await
        .expect("send");

    assert_eq!(recv(&mut a).await["event"], "gameJoined");
}

#[tokio::test]
async fn test_leave_game_frees_the_seat() {
    let (addr, _registry) = start_server().await;
    let (mut a, mut b) = seated_pair(&addr, "r1").await;

    send(&mut a, json!({"event": "leaveGame"})).await;
    assert_eq!(recv(&mut b).await["event"], "memberLeft");

    // A is free to sit somewhere else on the same connection.
    let joined = join(&mut a, "r2").await;
    assert_eq!(joined["data"]["roomKey"], "r2");
}

#[tokio::test]
async fn test_join_while_seated_is_refused() {
    let (addr, _registry) = start_server().await;
    let mut a = connect(&addr).await;
    join(&mut a, "r1").await;

    let refused = join(&mut a, "r2").await;

    assert_eq!(refused["data"]["reason"], "alreadyInRoom");
}

#[tokio::test]
async fn test_validated_moves_are_checked() {
    let (addr, _registry) = start_server().await;
    let (mut a, mut b) = seated_pair(&addr, "r1").await;

    send(&mut a, move_event("validatedMove", "r1", 4, "X")).await;
    let expected = json!({"event": "move", "data": {"cellIndex": 4, "symbol": "X"}});
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);

    // Same mover again.
    send(&mut a, move_event("validatedMove", "r1", 0, "O")).await;
    let refused = recv(&mut a).await;
    assert_eq!(refused["event"], "error");
    assert_eq!(refused["data"]["reason"], "illegalMove");

    // Taken cell.
    send(&mut b, move_event("validatedMove", "r1", 4, "O")).await;
    assert_eq!(recv(&mut b).await["data"]["reason"], "illegalMove");

    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_idle_waiting_room_is_closed() {
    let builder = TandemServer::builder()
        .idle_timeout(Duration::from_millis(50))
        .sweep_interval(Duration::from_millis(20));
    let (addr, registry) = start_server_with(builder).await;
    let mut a = connect(&addr).await;
    join(&mut a, "lonely").await;

    let closed = recv(&mut a).await;

    assert_eq!(
        closed,
        json!({"event": "roomClosed", "data": {"roomKey": "lonely", "reason": "idle"}})
    );
    wait_for_room_count(&registry, 0).await;

    // The connection stays open and can join again.
    assert_eq!(join(&mut a, "lonely").await["event"], "gameJoined");
}

#[tokio::test]
async fn test_silent_socket_does_not_stall_other_clients() {
    let (addr, _registry) = start_server().await;

    // A peer that opens TCP and never upgrades.
    let _silent = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("raw connect");

    let joined = tokio::time::timeout(Duration::from_secs(1), async {
        let mut a = connect(&addr).await;
        join(&mut a, "r1").await
    })
    .await
    .expect("join should not wait behind a silent socket");

    assert_eq!(joined["event"], "gameJoined");
}

#[tokio::test]
async fn test_member_left_reaches_partner_of_stalled_reader() {
    use tokio::io::AsyncWriteExt;
    use tokio_tungstenite::MaybeTlsStream;

    let (addr, _registry) = start_server().await;
    let mut a = connect(&addr).await;
    join(&mut a, "r1").await;

    // B keeps a tiny receive window and never reads after joining.
    let socket = tokio::net::TcpSocket::new_v4().expect("socket");
    socket.set_recv_buffer_size(4096).expect("recv buffer");
    let stream = socket
        .connect(addr.parse().expect("addr"))
        .await
        .expect("raw connect");
    let (mut b, _) = tokio_tungstenite::client_async(
        format!("ws://{addr}"),
        MaybeTlsStream::Plain(stream),
    )
    .await
    .expect("upgrade");
    assert_eq!(join(&mut b, "r1").await["event"], "gameJoined");
    assert_eq!(recv(&mut a).await["event"], "memberJoined");

    // Back up the server's writes to B.
    const MOVES: usize = 5000;
    for i in 0..MOVES {
        send(&mut a, move_event("move", "r1", (i % 9) as u8, "X")).await;
    }
    for _ in 0..MOVES {
        assert_eq!(recv(&mut a).await["event"], "move");
    }

    // B half-closes; its write side ends, but it still reads nothing.
    b.get_mut().shutdown().await.expect("shutdown");

    let left = recv(&mut a).await;
    assert_eq!(left["event"], "memberLeft");
}
