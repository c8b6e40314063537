//! Per-connection handler: handshake, auth, request routing, and the
//! push writer.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive `hello` (or `resume` for a returning client)
//!   2. Authenticate / validate the resume credential
//!   3. Send `welcome` / `resume_ok`
//!   4. Loop: inbound requests are dispatched to the hub; pushes queued
//!      by the hub are drained onto the socket
//!
//! The push channel closing is the hub's way of saying this connection
//! was superseded; the handler exits and its disconnect is a no-op.

use std::sync::Arc;
use std::time::Duration;

use greenroom_protocol::{
    ClientRequest, Codec, Envelope, Payload, PlayerId, ProtocolError,
    ServerMessage,
};
use greenroom_session::Authenticator;
use greenroom_transport::{ConnectionId, WsConnection};
use tokio::sync::mpsc;

use crate::GreenroomError;
use crate::server::{ServerContext, PROTOCOL_VERSION};

/// How long a connection may sit silent before we drop it. Heartbeats
/// keep healthy clients well inside this.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long the first message may take to arrive.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that reports the connection loss to the hub when the
/// handler exits, panics included. `Drop` is synchronous, so it spawns a
/// fire-and-forget task for the async lock.
struct DisconnectGuard {
    player_id: PlayerId,
    connection: ConnectionId,
    hub: Arc<crate::Hub>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let connection = self.connection;
        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            hub.disconnect(player_id, connection).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WsConnection,
    ctx: Arc<ServerContext<A, C>>,
) -> Result<(), GreenroomError>
where
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let mut seq: u64 = 1;
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();

    // --- Step 1: handshake or resume ---
    let player_id =
        match perform_handshake(&conn, &ctx, push_tx, &mut seq).await? {
            Some(player_id) => player_id,
            // Resume was rejected; the failure message is already out.
            None => return Ok(()),
        };

    tracing::info!(%conn_id, %player_id, "player connected");
    let _guard = DisconnectGuard {
        player_id,
        connection: conn_id,
        hub: Arc::clone(&ctx.hub),
    };

    // --- Step 2: request/push loop ---
    loop {
        tokio::select! {
            pushed = push_rx.recv() => {
                match pushed {
                    Some(message) => {
                        let close_after = matches!(
                            message,
                            ServerMessage::SessionReplaced { .. }
                        );
                        send_message(&conn, &ctx, &mut seq, message).await?;
                        if close_after {
                            tracing::info!(%player_id, "connection superseded");
                            let _ = conn.close().await;
                            break;
                        }
                    }
                    // Channel dropped: we were replaced without ceremony.
                    None => {
                        tracing::debug!(%player_id, "push channel closed");
                        break;
                    }
                }
            }

            inbound = tokio::time::timeout(IDLE_TIMEOUT, conn.recv()) => {
                let data = match inbound {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%player_id, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%player_id, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%player_id, "connection idle, dropping");
                        break;
                    }
                };

                let envelope: Envelope = match ctx.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(
                            %player_id, error = %e, "failed to decode envelope"
                        );
                        continue;
                    }
                };
                let Payload::Request(request) = envelope.payload else {
                    send_error(&conn, &ctx, &mut seq, 400, "expected a request")
                        .await?;
                    continue;
                };

                let should_close =
                    dispatch(&conn, &ctx, player_id, request, &mut seq).await?;
                if should_close {
                    break;
                }
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → hub.disconnect fires.
    Ok(())
}

/// Receives and answers the first message: `hello` or `resume`.
///
/// Returns the authenticated player, or `None` when a resume was
/// rejected (the client got `resume_failed` and the connection ends).
async fn perform_handshake<A, C>(
    conn: &WsConnection,
    ctx: &Arc<ServerContext<A, C>>,
    push_tx: mpsc::UnboundedSender<ServerMessage>,
    seq: &mut u64,
) -> Result<Option<PlayerId>, GreenroomError>
where
    A: Authenticator,
    C: Codec,
{
    let data =
        match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                return Err(ProtocolError::InvalidMessage(
                    "connection closed before handshake".into(),
                )
                .into());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ProtocolError::InvalidMessage(
                    "handshake timed out".into(),
                )
                .into());
            }
        };

    let envelope: Envelope = ctx.codec.decode(&data)?;

    match envelope.payload {
        Payload::Request(ClientRequest::Hello { version, token }) => {
            if version != PROTOCOL_VERSION {
                send_error(
                    conn,
                    ctx,
                    seq,
                    400,
                    &format!(
                        "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
                    ),
                )
                .await?;
                return Err(ProtocolError::InvalidMessage(
                    "protocol version mismatch".into(),
                )
                .into());
            }

            let token = token.as_deref().unwrap_or("");
            let player_id = match ctx.auth.authenticate(token).await {
                Ok(player_id) => player_id,
                Err(e) => {
                    send_error(conn, ctx, seq, 401, "unauthorized").await?;
                    return Err(e.into());
                }
            };

            let welcome = ctx
                .hub
                .open_session(player_id, conn.id(), push_tx)
                .await;
            send_message(conn, ctx, seq, welcome).await?;
            Ok(Some(player_id))
        }

        Payload::Request(ClientRequest::Resume {
            player_id,
            resume_token,
            last_seen_seq,
        }) => {
            let reply = ctx
                .hub
                .resume(
                    player_id,
                    &resume_token,
                    last_seen_seq,
                    conn.id(),
                    push_tx,
                )
                .await;
            let accepted = matches!(reply, ServerMessage::ResumeOk { .. });
            send_message(conn, ctx, seq, reply).await?;
            Ok(accepted.then_some(player_id))
        }

        _ => {
            send_error(conn, ctx, seq, 400, "expected hello or resume")
                .await?;
            Err(ProtocolError::InvalidMessage(
                "first message must be hello or resume".into(),
            )
            .into())
        }
    }
}

/// Routes one in-session request to the hub. Returns `true` if the
/// connection should close.
async fn dispatch<A, C>(
    conn: &WsConnection,
    ctx: &Arc<ServerContext<A, C>>,
    player_id: PlayerId,
    request: ClientRequest,
    seq: &mut u64,
) -> Result<bool, GreenroomError>
where
    A: Authenticator,
    C: Codec,
{
    let hub = &ctx.hub;
    let reply = match request {
        ClientRequest::Heartbeat { client_time } => {
            Ok(hub.heartbeat(player_id, client_time).await)
        }
        ClientRequest::CreateLobby {
            name,
            capacity,
            public,
        } => hub.create_lobby(player_id, name, capacity, public).await,
        ClientRequest::ListLobbies => Ok(hub.list_lobbies(player_id).await),
        ClientRequest::JoinLobby { lobby_id } => {
            hub.join_lobby(player_id, lobby_id).await
        }
        ClientRequest::LeaveLobby => hub.leave_lobby(player_id).await,
        ClientRequest::StartGame => hub.start_game(player_id).await,
        ClientRequest::ActivateSabotage { kind } => {
            hub.activate_sabotage(player_id, kind).await
        }
        ClientRequest::FixSabotage => hub.fix_sabotage(player_id).await,

        ClientRequest::Bye { reason } => {
            tracing::info!(%player_id, %reason, "client said goodbye");
            return Ok(true);
        }

        // A second hello or an in-band resume makes no sense on an
        // established connection.
        ClientRequest::Hello { .. } | ClientRequest::Resume { .. } => {
            send_error(conn, ctx, seq, 400, "already connected").await?;
            return Ok(false);
        }
    };

    match reply {
        Ok(message) => send_message(conn, ctx, seq, message).await?,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "request rejected");
            send_error(conn, ctx, seq, e.code(), &e.to_string()).await?;
        }
    }
    Ok(false)
}

/// Wraps a message in an envelope and writes it out.
async fn send_message<A, C>(
    conn: &WsConnection,
    ctx: &Arc<ServerContext<A, C>>,
    seq: &mut u64,
    message: ServerMessage,
) -> Result<(), GreenroomError>
where
    A: Authenticator,
    C: Codec,
{
    let envelope = Envelope {
        seq: next_seq(seq),
        timestamp: ctx.hub.uptime_ms(),
        payload: Payload::Message(message),
    };
    let bytes = ctx.codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

async fn send_error<A, C>(
    conn: &WsConnection,
    ctx: &Arc<ServerContext<A, C>>,
    seq: &mut u64,
    code: u16,
    message: &str,
) -> Result<(), GreenroomError>
where
    A: Authenticator,
    C: Codec,
{
    send_message(
        conn,
        ctx,
        seq,
        ServerMessage::Error {
            code,
            message: message.to_string(),
        },
    )
    .await
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
