//! Question bank: the pool of multiple-choice questions and the random,
//! non-repeating draw each game takes from it.

use crate::error::ServerError;
use rand::seq::SliceRandom;
use serde::Deserialize;

/// One multiple-choice question. Immutable once loaded; rooms receive
/// copies of the records they draw.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct: usize,
}

/// Pool of questions a game draws from.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    pool: Vec<Question>,
}

impl QuestionBank {
    pub fn new(pool: Vec<Question>) -> Self {
        Self { pool }
    }

    /// Loads a bank from a JSON array of question records, rejecting
    /// records whose correct-option index is out of range.
    pub fn from_json(input: &str) -> Result<Self, ServerError> {
        let pool: Vec<Question> = serde_json::from_str(input)?;
        for (index, question) in pool.iter().enumerate() {
            if question.correct >= question.options.len() {
                return Err(ServerError::InvalidQuestion {
                    index,
                    correct: question.correct,
                    options: question.options.len(),
                });
            }
        }
        Ok(Self { pool })
    }

    /// The built-in pool used when no question file is supplied.
    pub fn builtin() -> Self {
        let q = |text: &str, options: [&str; 4], correct: usize| Question {
            text: text.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct,
        };

        Self::new(vec![
            q(
                "Which keyword declares an immutable binding in Rust?",
                ["var", "let", "const fn", "static mut"],
                1,
            ),
            q(
                "What does TCP stand for?",
                [
                    "Transfer Control Protocol",
                    "Transmission Control Protocol",
                    "Transport Connection Protocol",
                    "Timed Checksum Protocol",
                ],
                1,
            ),
            q(
                "Which data structure gives O(1) average lookup by key?",
                ["Linked list", "Binary heap", "Hash table", "B-tree"],
                2,
            ),
            q(
                "What is the result of 0b1010 & 0b0110?",
                ["0b0010", "0b1110", "0b1100", "0b0100"],
                0,
            ),
            q(
                "Which HTTP status code means Not Found?",
                ["400", "403", "404", "500"],
                2,
            ),
            q(
                "In which year was the C programming language first released?",
                ["1969", "1972", "1978", "1983"],
                1,
            ),
            q(
                "Which sorting algorithm has the best worst-case complexity?",
                ["Quicksort", "Bubble sort", "Merge sort", "Insertion sort"],
                2,
            ),
            q(
                "What does the 'S' in SOLID stand for?",
                [
                    "Stateless design",
                    "Single responsibility",
                    "Synchronous calls",
                    "Structured programming",
                ],
                1,
            ),
            q(
                "Which of these is NOT a relational database?",
                ["PostgreSQL", "MySQL", "Redis", "SQLite"],
                2,
            ),
            q(
                "How many bits are in an IPv4 address?",
                ["16", "32", "64", "128"],
                1,
            ),
            q(
                "Which Git command creates a new branch and switches to it?",
                [
                    "git branch -m",
                    "git checkout -b",
                    "git switch --detach",
                    "git merge --new",
                ],
                1,
            ),
            q(
                "What is the default port for HTTPS?",
                ["80", "8080", "443", "22"],
                2,
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Draws up to `n` distinct questions in random order. Games never see
    /// the same question twice; a pool smaller than `n` yields the whole
    /// pool (shortening the game accordingly).
    pub fn draw(&self, n: usize) -> Vec<Question> {
        self.pool
            .choose_multiple(&mut rand::thread_rng(), n)
            .cloned()
            .collect()
    }
}
