//! # Trivia Game Server Library
//!
//! Authoritative server for a real-time multiplayer trivia game. Players
//! join a room, answer multiple-choice questions against a deadline, and
//! the server tallies per-player scores across a fixed number of rounds.
//!
//! ## Core Responsibilities
//!
//! ### Room Lifecycle
//! Rooms move through Waiting -> Playing -> Finished, monotonically. A
//! room accepts players only while Waiting, starts once every connected
//! player has signalled readiness, and tears itself down (including its
//! registry entry) when the last round ends or the roster empties.
//!
//! ### Round Progression
//! Each round the room dispatches a question to every active session,
//! collects answers until either all active players have answered or the
//! deadline timer fires, broadcasts the result with the running score
//! table, then schedules the next round or finishes the game.
//!
//! ### Concurrency Discipline
//! One tokio task per connection reads that client's socket; one task per
//! connection drains its outbound channel; one task per armed deadline
//! fires the round timeout. All of them mutate a room only under its
//! single mutex, and round completion re-validates state under the lock,
//! so the timer-versus-last-answer race resolves to exactly one result
//! broadcast per round.
//!
//! ## Module Organization
//!
//! - [`questions`]: the question bank and the random non-repeating draw
//!   each game takes from it.
//! - [`session`]: per-player state (identity, outbound transport handle,
//!   answered flag, cumulative score).
//! - [`room`]: the round/answer state machine (the core of the server).
//! - [`registry`]: process-wide room table and identity allocation.
//! - [`network`]: TCP accept loop, newline-delimited JSON framing, and
//!   the per-connection tasks.
//! - [`config`] / [`error`]: tunables and the error taxonomy.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//! use server::questions::QuestionBank;
//! use server::registry::Registry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new(GameConfig::default(), QuestionBank::builtin());
//!     let server = Server::bind("127.0.0.1:20250", registry).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Containment
//!
//! Nothing in the room core terminates the process. Malformed messages
//! close the offending connection; send/receive failures are converted
//! into that player's disconnect handling; a room left with no active
//! players mid-game is forced to Finished rather than left dangling.

pub mod config;
pub mod error;
pub mod network;
pub mod questions;
pub mod registry;
pub mod room;
pub mod session;
