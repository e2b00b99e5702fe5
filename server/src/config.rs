//! Tunable game parameters, collected once at startup and shared by
//! every room the registry creates.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Maximum players a room accepts while waiting.
    pub max_players: usize,
    /// Questions drawn per game; also the round count.
    pub rounds: usize,
    /// How long a round stays open for answers.
    pub round_time: Duration,
    /// Pause between a round result and the next question.
    pub inter_round_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: shared::MAX_PLAYERS_PER_ROOM,
            rounds: shared::TOTAL_ROUNDS,
            round_time: Duration::from_secs(shared::ROUND_TIME_SECS),
            inter_round_delay: Duration::from_secs(shared::INTER_ROUND_DELAY_SECS),
        }
    }
}
