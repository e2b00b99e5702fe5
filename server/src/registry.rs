//! Process-wide room registry.
//!
//! Routes create/join requests, hands out monotonically increasing room
//! and player identities, and owns the set of live rooms. The registry's
//! map lock is a separate lock domain from every room's internal mutex:
//! lookups release it before touching a room, and a room only calls back
//! in through [`Registry::remove_room`] as its terminal action.

use crate::config::GameConfig;
use crate::error::ServerError;
use crate::questions::QuestionBank;
use crate::room::Room;
use crate::session::PlayerSession;
use log::{debug, info};
use shared::ServerMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;

pub struct Registry {
    rooms: Mutex<HashMap<u32, Arc<Room>>>,
    next_room_id: AtomicU32,
    next_player_id: AtomicU32,
    config: GameConfig,
    bank: QuestionBank,
    me: Weak<Registry>,
}

impl Registry {
    pub fn new(config: GameConfig, bank: QuestionBank) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            rooms: Mutex::new(HashMap::new()),
            next_room_id: AtomicU32::new(0),
            next_player_id: AtomicU32::new(0),
            config,
            bank,
            me: me.clone(),
        })
    }

    /// Allocates the next player identity. Identities are process-wide
    /// and never reused, so a departed player's score stays attributable.
    pub fn alloc_player_id(&self) -> u32 {
        self.next_player_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Creates a room in Waiting phase around its first player. Draws the
    /// game's questions up front so rounds never repeat one. Never fails.
    pub async fn create_room(
        &self,
        sender: UnboundedSender<ServerMessage>,
    ) -> (Arc<Room>, u32, u32) {
        let player_id = self.alloc_player_id();
        let room_id = self.next_room_id.fetch_add(1, Ordering::Relaxed);
        let questions = self.bank.draw(self.config.rounds);
        let session = PlayerSession::new(player_id, sender);

        let room = Room::new(
            room_id,
            self.config.clone(),
            self.me.clone(),
            questions,
            session,
        );
        self.rooms.lock().await.insert(room_id, Arc::clone(&room));
        info!("created room {} for player {}", room_id, player_id);
        (room, room_id, player_id)
    }

    /// Joins an existing waiting room. Fails with [`ServerError::RoomNotFound`]
    /// if the room is unknown, already started, or full; the caller reports
    /// all of these as the same null-`game_id` status.
    pub async fn join_room(
        &self,
        room_id: u32,
        sender: UnboundedSender<ServerMessage>,
    ) -> Result<(u32, Vec<u32>, Arc<Room>), ServerError> {
        let room = {
            self.rooms.lock().await.get(&room_id).cloned()
        }
        .ok_or(ServerError::RoomNotFound(room_id))?;

        let player_id = self.alloc_player_id();
        let roster = room.join(PlayerSession::new(player_id, sender)).await?;
        Ok((player_id, roster, room))
    }

    /// Drops a room from the table. Idempotent; rooms call this exactly
    /// once as they finish, but nothing breaks if the entry is gone.
    pub async fn remove_room(&self, room_id: u32) -> bool {
        let removed = self.rooms.lock().await.remove(&room_id).is_some();
        if removed {
            info!("removed room {}", room_id);
        } else {
            debug!("remove_room({}): already gone", room_id);
        }
        removed
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
