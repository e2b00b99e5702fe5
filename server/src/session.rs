//! Per-player session state inside a room.
//!
//! A session wraps the player's identity, the outbound half of their
//! connection, and the per-round bookkeeping the room mutates while the
//! game runs. The transport handle is an unbounded channel drained by the
//! connection's writer task, so sending never blocks room-side logic.

use shared::ServerMessage;
use tokio::sync::mpsc::UnboundedSender;

/// A player currently on a room's active roster.
#[derive(Debug)]
pub struct PlayerSession {
    /// Process-wide unique identity assigned by the registry.
    pub id: u32,
    /// Outbound transport; `None` once disconnect handling has run.
    sender: Option<UnboundedSender<ServerMessage>>,
    /// Whether this player has already answered the current round.
    pub answered: bool,
    /// Whether this player has signalled readiness to start.
    pub ready: bool,
    /// Cumulative score across rounds.
    pub score: u32,
}

impl PlayerSession {
    pub fn new(id: u32, sender: UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            sender: Some(sender),
            answered: false,
            ready: false,
            score: 0,
        }
    }

    /// Queues a message for delivery. Returns false if the transport has
    /// been cleared or the connection's writer task is gone; the caller
    /// decides whether that failure triggers disconnect handling.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match &self.sender {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    /// Clears the transport handle. Idempotent: returns true only the
    /// first time, so double-close is a defined no-op.
    pub fn take_transport(&mut self) -> bool {
        self.sender.take().is_some()
    }
}
