//! Room: the round/answer state machine at the heart of the server.
//!
//! A room owns its roster of player sessions, the questions drawn for the
//! game, the current round's bookkeeping, and the deadline timer. Several
//! tasks touch a room concurrently (one per connected player plus the
//! round timer), so every mutation happens under the single room-scoped
//! mutex. Round completion can be reached from three paths (timer expiry,
//! last expected answer, disconnect of the last unanswered player); all of
//! them funnel into [`Room::complete_round_locked`], which runs with the
//! guard already held and bails out unless the round is still open, so the
//! completion is idempotent per round and the paths cannot race.
//!
//! Nothing awaits while the room lock is held: outbound messages go
//! through unbounded channels and the deadline timer is a spawned task
//! that re-acquires the lock when it fires. The single call back into the
//! registry (terminal deregistration) happens after the guard is dropped.

use crate::config::GameConfig;
use crate::error::ServerError;
use crate::questions::Question;
use crate::registry::Registry;
use crate::session::PlayerSession;
use log::{debug, info, warn};
use shared::{DepartedPlayer, ServerMessage};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Lifecycle phase of a room. Transitions are monotonic:
/// Waiting -> Playing -> Finished, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Playing,
    Finished,
}

struct RoomState {
    phase: Phase,
    /// Active sessions in join order; this order defines `curr_score`.
    players: Vec<PlayerSession>,
    /// Frozen scores of players removed mid-game. Append-only.
    departed: Vec<DepartedPlayer>,
    /// Questions drawn for this game, one per round.
    questions: Vec<Question>,
    /// Rounds launched so far; the current round is `rounds_launched - 1`.
    rounds_launched: usize,
    /// True between question dispatch and round completion.
    round_open: bool,
    /// Answers accepted for the current round.
    answers_received: usize,
    round_started_at: Option<Instant>,
    /// Deadline timer for the open round, or the inter-round delay task
    /// between rounds. Aborted whenever the round completes another way.
    timer: Option<JoinHandle<()>>,
}

pub struct Room {
    pub id: u32,
    config: GameConfig,
    registry: Weak<Registry>,
    me: Weak<Room>,
    state: Mutex<RoomState>,
}

impl Room {
    /// Creates a room in Waiting phase holding its first player.
    pub fn new(
        id: u32,
        config: GameConfig,
        registry: Weak<Registry>,
        questions: Vec<Question>,
        first_player: PlayerSession,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id,
            config,
            registry,
            me: me.clone(),
            state: Mutex::new(RoomState {
                phase: Phase::Waiting,
                players: vec![first_player],
                departed: Vec::new(),
                questions,
                rounds_launched: 0,
                round_open: false,
                answers_received: 0,
                round_started_at: None,
                timer: None,
            }),
        })
    }

    /// Adds a player to a waiting room and notifies everyone already
    /// present. Returns the full roster on success. Rejected once the
    /// room has left Waiting or is at capacity.
    pub async fn join(&self, session: PlayerSession) -> Result<Vec<u32>, ServerError> {
        let joiner = session.id;
        let (result, finished) = {
            let mut st = self.state.lock().await;
            if st.phase != Phase::Waiting || st.players.len() >= self.config.max_players {
                (Err(ServerError::RoomNotFound(self.id)), false)
            } else {
                st.players.push(session);
                info!("room {}: player {} joined", self.id, joiner);

                // A failed notification disconnects the unreachable
                // session, never the joiner.
                let msg = ServerMessage::NewPlayer { player_id: joiner };
                let mut unreachable = Vec::new();
                for p in st.players.iter() {
                    if p.id != joiner && p.is_connected() && !p.send(msg.clone()) {
                        unreachable.push(p.id);
                    }
                }
                let mut finished = false;
                for id in unreachable {
                    finished |= self.disconnect_locked(&mut st, id);
                }

                let roster = st.players.iter().map(|p| p.id).collect();
                (Ok(roster), finished)
            }
        };
        if finished {
            self.deregister().await;
        }
        result
    }

    /// Records a readiness signal. The game starts as soon as every
    /// player currently on the roster is ready, measured at this moment,
    /// not against a snapshot from join time.
    pub async fn mark_ready(&self, player_id: u32) {
        let finished = {
            let mut st = self.state.lock().await;
            if st.phase != Phase::Waiting {
                debug!(
                    "room {}: ready from player {} ignored, game already started",
                    self.id, player_id
                );
                false
            } else {
                if let Some(p) = st.players.iter_mut().find(|p| p.id == player_id) {
                    if !p.ready {
                        p.ready = true;
                        info!("room {}: player {} is ready", self.id, player_id);
                    }
                }
                self.check_ready_locked(&mut st)
            }
        };
        if finished {
            self.deregister().await;
        }
    }

    /// Accepts an answer for the current round. Late, duplicate, or
    /// unroutable submissions are silently discarded: at-most-once
    /// scoring per player per round. When the last active player answers,
    /// the round completes immediately instead of waiting for the timer.
    pub async fn submit_answer(&self, player_id: u32, round: usize, answer: Option<usize>) {
        let finished = {
            let mut st = self.state.lock().await;
            // `round` comes off the wire; checked_add keeps an absurd
            // index from overflowing instead of being discarded.
            if st.phase != Phase::Playing
                || !st.round_open
                || round.checked_add(1) != Some(st.rounds_launched)
            {
                debug!(
                    "room {}: discarding answer from player {} for round {}",
                    self.id, player_id, round
                );
                false
            } else {
                let correct = st.questions[round].correct;
                let Some(p) = st.players.iter_mut().find(|p| p.id == player_id) else {
                    return;
                };
                if p.answered {
                    debug!(
                        "room {}: duplicate answer from player {} for round {}",
                        self.id, player_id, round
                    );
                    false
                } else {
                    p.answered = true;
                    if answer == Some(correct) {
                        p.score += 1;
                    }
                    st.answers_received += 1;
                    debug!(
                        "room {}: player {} answered round {} ({}/{} in)",
                        self.id,
                        player_id,
                        round,
                        st.answers_received,
                        st.players.len()
                    );
                    if st.answers_received >= st.players.len() {
                        self.complete_round_locked(&mut st)
                    } else {
                        false
                    }
                }
            }
        };
        if finished {
            self.deregister().await;
        }
    }

    /// Removes a player from the active roster. Idempotent: a player
    /// already gone is a no-op. Mid-game the score is frozen into the
    /// departed list; an emptied roster forces the game to finish, and a
    /// disconnect that leaves every remaining player answered completes
    /// the round just like the last answer would.
    pub async fn handle_disconnect(&self, player_id: u32) {
        let finished = {
            let mut st = self.state.lock().await;
            self.disconnect_locked(&mut st, player_id)
        };
        if finished {
            self.deregister().await;
        }
    }

    /// Ends the game: cancels any live timer, broadcasts final standings,
    /// closes all transports, and deregisters the room. Concurrent
    /// triggers collapse into one execution.
    pub async fn finish(&self) {
        let finished = {
            let mut st = self.state.lock().await;
            self.finish_locked(&mut st)
        };
        if finished {
            self.deregister().await;
        }
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    /// Active players in roster order.
    pub async fn roster(&self) -> Vec<u32> {
        self.state.lock().await.players.iter().map(|p| p.id).collect()
    }

    /// Scores of active players in roster order.
    pub async fn scores(&self) -> Vec<u32> {
        self.state
            .lock()
            .await
            .players
            .iter()
            .map(|p| p.score)
            .collect()
    }

    /// Frozen scores of departed players, in departure order.
    pub async fn departed(&self) -> Vec<DepartedPlayer> {
        self.state.lock().await.departed.clone()
    }

    /// Timer callback for a round's deadline. Re-validates the room and
    /// round state after waking so a stale fire (the round already closed
    /// by the last answer or a disconnect) is a no-op.
    async fn handle_round_timeout(&self, round: usize) {
        let finished = {
            let mut st = self.state.lock().await;
            if st.phase != Phase::Playing || !st.round_open || st.rounds_launched != round + 1 {
                debug!("room {}: stale timer fire for round {}", self.id, round);
                false
            } else {
                info!("room {}: round {} timed out", self.id, round);
                self.complete_round_locked(&mut st)
            }
        };
        if finished {
            self.deregister().await;
        }
    }

    /// Starts the next round after the inter-round delay (or immediately
    /// for round 0). Guards against the game having finished in between.
    async fn start_round(&self) {
        let finished = {
            let mut st = self.state.lock().await;
            self.start_round_locked(&mut st)
        };
        if finished {
            self.deregister().await;
        }
    }

    /// Transitions Waiting -> Playing and launches round 0 once every
    /// active player is ready. Returns true if the room finished while
    /// dispatching (every transport failed at once).
    fn check_ready_locked(&self, st: &mut RoomState) -> bool {
        if st.phase != Phase::Waiting || st.players.is_empty() {
            return false;
        }
        if !st.players.iter().all(|p| p.ready) {
            return false;
        }

        st.phase = Phase::Playing;
        info!(
            "room {}: all {} players ready, game starting ({} rounds)",
            self.id,
            st.players.len(),
            st.questions.len()
        );
        self.start_round_locked(st)
    }

    /// Dispatches the next undrawn question: resets answered flags,
    /// broadcasts the question, and arms the deadline timer. Counts the
    /// round as launched within the same lock acquisition, so completion
    /// paths observe a consistent round index.
    fn start_round_locked(&self, st: &mut RoomState) -> bool {
        if st.phase != Phase::Playing || st.rounds_launched >= st.questions.len() {
            return false;
        }

        let round = st.rounds_launched;
        for p in st.players.iter_mut() {
            p.answered = false;
        }
        st.answers_received = 0;
        st.round_open = true;
        st.round_started_at = Some(Instant::now());
        st.rounds_launched += 1;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }

        let question = &st.questions[round];
        let msg = ServerMessage::Question {
            round,
            question: question.text.clone(),
            options: question.options.clone(),
        };
        info!(
            "room {}: round {} started with {} players",
            self.id,
            round,
            st.players.len()
        );

        let finished = self.broadcast_locked(st, &msg);

        // Arm the deadline only if the dispatch left the round standing.
        if st.phase == Phase::Playing && st.round_open {
            let me = self.me.clone();
            let deadline = self.config.round_time;
            st.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                if let Some(room) = me.upgrade() {
                    room.handle_round_timeout(round).await;
                }
            }));
        }
        finished
    }

    /// Completes the open round exactly once: closes it, cancels the
    /// timer, broadcasts the result, then either schedules the next round
    /// or finishes the game.
    fn complete_round_locked(&self, st: &mut RoomState) -> bool {
        if st.phase != Phase::Playing || !st.round_open {
            return false;
        }

        st.round_open = false;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }

        let round = st.rounds_launched - 1;
        if let Some(started_at) = st.round_started_at.take() {
            debug!(
                "room {}: round {} closed after {:?}",
                self.id,
                round,
                started_at.elapsed()
            );
        }

        let msg = ServerMessage::CorrectAnswer {
            correct_answ: st.questions[round].correct,
            curr_score: st.players.iter().map(|p| p.score).collect(),
            deleted_players: st.departed.clone(),
        };
        let mut finished = self.broadcast_locked(st, &msg);

        if st.phase != Phase::Playing {
            // The result broadcast drained the roster.
            return finished;
        }

        if st.rounds_launched >= st.questions.len() {
            finished |= self.finish_locked(st);
        } else {
            let me = self.me.clone();
            let delay = self.config.inter_round_delay;
            st.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(room) = me.upgrade() {
                    room.start_round().await;
                }
            }));
        }
        finished
    }

    fn disconnect_locked(&self, st: &mut RoomState, player_id: u32) -> bool {
        if st.phase == Phase::Finished {
            return false;
        }
        let Some(pos) = st.players.iter().position(|p| p.id == player_id) else {
            // Already departed; double disconnects are a no-op.
            return false;
        };

        let mut session = st.players.remove(pos);
        session.take_transport();
        info!("room {}: player {} disconnected", self.id, player_id);

        match st.phase {
            Phase::Waiting => {
                if st.players.is_empty() {
                    info!("room {}: emptied before starting", self.id);
                    st.phase = Phase::Finished;
                    return true;
                }
                // The leaver may have been the only player not ready.
                self.check_ready_locked(st)
            }
            Phase::Playing => {
                st.departed.push(DepartedPlayer {
                    id: session.id,
                    score: session.score,
                });
                if session.answered && st.answers_received > 0 {
                    st.answers_received -= 1;
                }

                if st.players.is_empty() {
                    warn!("room {}: all players disconnected mid-game", self.id);
                    return self.finish_locked(st);
                }
                if st.round_open && st.answers_received >= st.players.len() {
                    return self.complete_round_locked(st);
                }
                false
            }
            Phase::Finished => false,
        }
    }

    fn finish_locked(&self, st: &mut RoomState) -> bool {
        if st.phase == Phase::Finished {
            return false;
        }
        st.phase = Phase::Finished;
        st.round_open = false;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }

        // Ties are not broken here: winner is just one of the top scorers
        // and clients compare curr_score themselves.
        let winner = st.players.iter().max_by_key(|p| p.score).map(|p| p.id);
        let msg = ServerMessage::EndGame {
            winner,
            curr_score: st.players.iter().map(|p| p.score).collect(),
        };
        info!(
            "room {}: game over, winner {:?}, scores {:?}",
            self.id,
            winner,
            st.players.iter().map(|p| (p.id, p.score)).collect::<Vec<_>>()
        );

        // Best-effort final standings, then close every transport.
        for p in st.players.iter() {
            let _ = p.send(msg.clone());
        }
        for p in st.players.iter_mut() {
            p.take_transport();
        }
        true
    }

    /// Fans a message out to every active session. A failed delivery is
    /// converted into that session's disconnect handling without aborting
    /// delivery to the rest.
    fn broadcast_locked(&self, st: &mut RoomState, msg: &ServerMessage) -> bool {
        let mut unreachable = Vec::new();
        for p in st.players.iter() {
            if p.is_connected() && !p.send(msg.clone()) {
                unreachable.push(p.id);
            }
        }

        let mut finished = false;
        for id in unreachable {
            warn!("room {}: dropping unreachable player {}", self.id, id);
            finished |= self.disconnect_locked(st, id);
        }
        finished
    }

    /// Terminal call back into the registry; always made after the room
    /// lock has been released.
    async fn deregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_room(self.id).await;
        }
    }
}
