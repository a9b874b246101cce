//! Per-connection handler: event decoding and routing.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's mailbox. The flow is:
//!   1. Create the mailbox and spawn the writer
//!   2. Loop: receive frame → decode `ClientEvent` → call the registry
//!   3. On exit, free the connection's seat (if any) exactly once

use std::sync::Arc;
use std::time::Duration;

use tandem_protocol::{ClientEvent, Codec, ConnectionId, ServerEvent};
use tandem_room::{Member, Registry, RoomError};
use tandem_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::TandemError;
use crate::server::ServerState;

/// How long the close handshake may take once the peer has stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Drop guard that frees the connection's seat when the handler exits.
///
/// This runs even if the handler panics or returns early. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async leave.
struct LeaveGuard {
    conn_id: ConnectionId,
    registry: Arc<Registry>,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            if let Some(room) = registry.leave(conn_id).await {
                tracing::debug!(%conn_id, %room, "seat freed on disconnect");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), TandemError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbox, inbox) = mpsc::unbounded_channel();
    let member = Member::new(conn_id, outbox);
    let writer = tokio::spawn(write_events(
        Arc::clone(&conn),
        Arc::clone(&state),
        inbox,
    ));

    let guard = LeaveGuard {
        conn_id,
        registry: Arc::clone(&state.registry),
    };

    let result = read_events(&conn, &state, &member).await;

    // The partner hears `memberLeft` before we spend any time on the close.
    drop(guard);
    writer.abort();
    if tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await.is_err() {
        tracing::debug!(%conn_id, "close handshake timed out");
    }
    result
}

/// Reads and dispatches frames until the peer goes away.
async fn read_events<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    member: &Member,
) -> Result<(), TandemError> {
    let conn_id = member.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "skipping undecodable frame");
                continue;
            }
        };

        if let Err(e) = dispatch(&state.registry, member, event).await {
            tracing::debug!(%conn_id, error = %e, "request refused");
            member.send(ServerEvent::Error {
                reason: e.reason(),
                message: e.to_string(),
            });
        }
    }
}

/// Routes one client event to the registry.
///
/// Errors are reported to the requester only, through its own mailbox so
/// they stay ordered with the room broadcasts it receives.
async fn dispatch(
    registry: &Registry,
    member: &Member,
    event: ClientEvent,
) -> Result<(), RoomError> {
    let conn_id = member.id();
    match event {
        ClientEvent::JoinGame(room) => {
            registry.join(member, &room).await?;
        }
        ClientEvent::Move(request) => {
            let (room, payload) = request.into_parts();
            registry.relay(conn_id, &room, payload).await?;
        }
        ClientEvent::ValidatedMove(request) => {
            let (room, payload) = request.into_parts();
            registry.validated_move(conn_id, &room, payload).await?;
        }
        ClientEvent::ResetGame(room) => {
            registry.reset(conn_id, &room).await?;
        }
        ClientEvent::LeaveGame => {
            registry.leave(conn_id).await;
        }
    }
    Ok(())
}

/// Drains the mailbox into the socket.
///
/// Stops when the socket refuses a frame or every sender is gone.
async fn write_events<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut inbox: mpsc::UnboundedReceiver<ServerEvent>,
) {
    let conn_id = conn.id();
    while let Some(event) = inbox.recv().await {
        let bytes = match state.codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, writer stopping");
            break;
        }
    }
}
