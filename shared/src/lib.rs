//! Wire protocol shared between the trivia server and its clients.
//!
//! Every message is a single JSON object with a `type` discriminator,
//! framed as one object per line (newline-delimited) in both directions.
//! Answer positions are 0-based option indices everywhere: the `answer`
//! field of an answer submission and the `correct_answ` field of a round
//! result both index into the `options` list of the question.

use serde::{Deserialize, Serialize};

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 20250;
/// Rounds played per game.
pub const TOTAL_ROUNDS: usize = 5;
/// Seconds each round stays open for answers.
pub const ROUND_TIME_SECS: u64 = 40;
/// Pause between a round result and the next question, in seconds.
pub const INTER_ROUND_DELAY_SECS: u64 = 5;
/// Maximum players a single room accepts.
pub const MAX_PLAYERS_PER_ROOM: usize = 10;

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Create a new room; the sender becomes its first player.
    #[serde(rename = "create")]
    Create,
    /// Join an existing room that is still waiting for players.
    #[serde(rename = "connect")]
    Connect { game_id: u32 },
    /// Signal readiness; the game starts once every connected player is ready.
    #[serde(rename = "ready to start")]
    ReadyToStart,
    /// Submit an answer for a round. `answer: null` reports that the
    /// client let its local input window expire without choosing.
    #[serde(rename = "answer")]
    Answer {
        round: usize,
        answer: Option<usize>,
    },
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Reply to `create`/`connect`. `game_id` is `null` when the join
    /// failed (unknown room, room already started, or room full).
    #[serde(rename = "status")]
    Status {
        player_id: u32,
        game_id: Option<u32>,
        list_of_players: Vec<u32>,
    },
    /// Another player joined the room the recipient is waiting in.
    #[serde(rename = "new player")]
    NewPlayer { player_id: u32 },
    /// A round has started. `round` is 0-based.
    #[serde(rename = "question")]
    Question {
        round: usize,
        question: String,
        options: Vec<String>,
    },
    /// A round has ended. `curr_score` lists active players in roster
    /// order; `deleted_players` carries the frozen scores of everyone
    /// who disconnected since the game started.
    #[serde(rename = "correct answer")]
    CorrectAnswer {
        correct_answ: usize,
        curr_score: Vec<u32>,
        deleted_players: Vec<DepartedPlayer>,
    },
    /// The game is over. `winner` is one of the top-scoring players, or
    /// `null` if nobody is left; ties are not broken here, clients must
    /// compare `curr_score` themselves.
    #[serde(rename = "end game")]
    EndGame {
        winner: Option<u32>,
        curr_score: Vec<u32>,
    },
}

/// Identity and final score of a player removed from the active roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartedPlayer {
    pub id: u32,
    pub score: u32,
}

/// Serializes a message as one newline-terminated JSON line.
pub fn encode_line<T: Serialize>(msg: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Parses one framed line back into a message, tolerating trailing
/// line-ending characters.
pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> serde_json::Result<T> {
    serde_json::from_str(line.trim_end())
}
