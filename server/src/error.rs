//! Error taxonomy for the trivia server.
//!
//! Per-connection failures are contained to that connection's task and
//! converted into disconnect handling; nothing here may take down a room
//! or the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The requested room does not exist, already started, or is full.
    /// Reported back to the requester as a `status` with a null `game_id`.
    #[error("room {0} not found or no longer accepting players")]
    RoomNotFound(u32),

    /// The client sent something that is not a valid protocol message.
    /// Closes the offending connection.
    #[error("malformed client message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// A syntactically valid message arrived where the protocol does not
    /// allow it (for example `answer` before joining a room).
    #[error("unroutable message: {0}")]
    Unroutable(&'static str),

    /// A question record references an option that does not exist.
    #[error("question {index}: correct-option index {correct} out of range ({options} options)")]
    InvalidQuestion {
        index: usize,
        correct: usize,
        options: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
