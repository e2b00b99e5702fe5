//! TCP layer: connection accept loop, newline-delimited JSON framing, and
//! the per-connection read/write tasks.
//!
//! Every accepted connection gets its own reader task (this module) and a
//! writer task draining the session's outbound channel, so one slow or
//! dead client never blocks a room broadcast. Read failures, EOF, and
//! protocol violations all end the same way: the connection's player is
//! routed through the room's disconnect handling and the tasks wind down.

use crate::error::ServerError;
use crate::registry::Registry;
use crate::room::Room;
use log::{error, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Accept loop wrapper around the listener and the shared registry.
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl Server {
    pub async fn bind(addr: &str, registry: Arc<Registry>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", listener.local_addr()?);
        Ok(Self { listener, registry })
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one task per client. Per-connection
    /// failures are contained to that task.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, registry).await {
                    warn!("connection {} closed: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Registry>,
) -> Result<(), ServerError> {
    info!("new connection from {}", addr);

    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(write_loop(write_half, rx));
    let mut lines = BufReader::new(read_half).lines();

    // The handshake owns our sender clone; afterwards the session inside
    // the room holds the only one, so the writer drains and exits when
    // disconnect handling or game end clears the transport.
    let joined = match handshake(&mut lines, &registry, &tx).await {
        Ok(joined) => joined,
        Err(e) => {
            drop(tx);
            let _ = writer.await;
            return Err(e);
        }
    };
    drop(tx);

    let Some((player_id, room)) = joined else {
        // Client went away without joining a room.
        let _ = writer.await;
        return Ok(());
    };

    let result = serve_player(&mut lines, &room, player_id).await;
    room.handle_disconnect(player_id).await;
    let _ = writer.await;
    result
}

/// Drains the session's outbound channel onto the socket, one JSON line
/// per message. Ends when every sender is gone or the peer stops reading.
async fn write_loop<W>(mut writer: W, mut rx: UnboundedReceiver<ServerMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let line = match shared::encode_line(&msg) {
            Ok(line) => line,
            Err(e) => {
                error!("failed to serialize outbound message: {}", e);
                continue;
            }
        };
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Reads messages until the client has created or joined a room. A failed
/// `connect` gets a null-`game_id` status and the client may try again;
/// anything other than `create`/`connect` here closes the connection.
async fn handshake<R>(
    lines: &mut Lines<R>,
    registry: &Arc<Registry>,
    tx: &UnboundedSender<ServerMessage>,
) -> Result<Option<(u32, Arc<Room>)>, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match shared::decode_line::<ClientMessage>(&line)? {
            ClientMessage::Create => {
                let (room, room_id, player_id) = registry.create_room(tx.clone()).await;
                let _ = tx.send(ServerMessage::Status {
                    player_id,
                    game_id: Some(room_id),
                    list_of_players: vec![player_id],
                });
                return Ok(Some((player_id, room)));
            }
            ClientMessage::Connect { game_id } => {
                match registry.join_room(game_id, tx.clone()).await {
                    Ok((player_id, roster, room)) => {
                        let _ = tx.send(ServerMessage::Status {
                            player_id,
                            game_id: Some(game_id),
                            list_of_players: roster,
                        });
                        return Ok(Some((player_id, room)));
                    }
                    Err(ServerError::RoomNotFound(_)) => {
                        warn!("join rejected for room {}", game_id);
                        let _ = tx.send(ServerMessage::Status {
                            player_id: 0,
                            game_id: None,
                            list_of_players: vec![],
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
            ClientMessage::ReadyToStart | ClientMessage::Answer { .. } => {
                return Err(ServerError::Unroutable(
                    "game message before joining a room",
                ));
            }
        }
    }
    Ok(None)
}

/// Services a joined player until EOF or a protocol violation.
async fn serve_player<R>(
    lines: &mut Lines<R>,
    room: &Arc<Room>,
    player_id: u32,
) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let msg = match shared::decode_line::<ClientMessage>(&line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("protocol error from player {}: {}", player_id, e);
                return Err(e.into());
            }
        };
        match msg {
            ClientMessage::ReadyToStart => room.mark_ready(player_id).await,
            ClientMessage::Answer { round, answer } => {
                room.submit_answer(player_id, round, answer).await
            }
            ClientMessage::Create | ClientMessage::Connect { .. } => {
                warn!(
                    "player {} tried to create/join while already in a room",
                    player_id
                );
            }
        }
    }
    Ok(())
}
