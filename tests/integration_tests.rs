//! Integration tests for the trivia server over real TCP connections.
//!
//! These tests exercise the full stack: accept loop, newline-delimited
//! JSON framing, the room state machine, and disconnect handling.

use server::config::GameConfig;
use server::network::Server;
use server::questions::{Question, QuestionBank};
use server::registry::Registry;
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on an ephemeral port with a deterministic question
/// pool (the correct option is always index 2).
async fn start_server(rounds: usize, round_ms: u64, delay_ms: u64) -> SocketAddr {
    let questions = (0..rounds)
        .map(|i| Question {
            text: format!("test question {i}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct: 2,
        })
        .collect();

    let config = GameConfig {
        max_players: 4,
        rounds,
        round_time: Duration::from_millis(round_ms),
        inter_round_delay: Duration::from_millis(delay_ms),
    };
    let registry = Registry::new(config, QuestionBank::new(questions));
    let server = Server::bind("127.0.0.1:0", registry)
        .await
        .expect("bind server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    addr
}

/// Minimal line-framed JSON client.
struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, write_half) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
        }
    }

    async fn send(&mut self, msg: &ClientMessage) {
        let line = shared::encode_line(msg).expect("encode");
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("send to server");
    }

    async fn recv(&mut self) -> ServerMessage {
        let line = timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for server message")
            .expect("read from server")
            .expect("server closed the connection");
        shared::decode_line(&line).expect("decode server message")
    }

    /// Receives messages until one matches, discarding the rest.
    async fn recv_matching(&mut self, pred: fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let msg = self.recv().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    /// Asserts the server closed this connection.
    async fn expect_closed(&mut self) {
        let next = timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for close");
        assert!(matches!(next, Ok(None) | Err(_)));
    }
}

/// Creates a room with one client and joins a second, returning both plus
/// the room id. Consumes the status/new-player chatter.
async fn two_player_room(addr: SocketAddr) -> (TestClient, TestClient, u32) {
    let mut creator = TestClient::connect(addr).await;
    creator.send(&ClientMessage::Create).await;
    let room_id = match creator.recv().await {
        ServerMessage::Status {
            player_id: 0,
            game_id: Some(room_id),
            list_of_players,
        } => {
            assert_eq!(list_of_players, vec![0]);
            room_id
        }
        other => panic!("unexpected create reply: {other:?}"),
    };

    let mut joiner = TestClient::connect(addr).await;
    joiner
        .send(&ClientMessage::Connect { game_id: room_id })
        .await;
    match joiner.recv().await {
        ServerMessage::Status {
            player_id: 1,
            game_id: Some(id),
            list_of_players,
        } => {
            assert_eq!(id, room_id);
            assert_eq!(list_of_players, vec![0, 1]);
        }
        other => panic!("unexpected join reply: {other:?}"),
    }

    assert_eq!(
        creator.recv().await,
        ServerMessage::NewPlayer { player_id: 1 }
    );

    (creator, joiner, room_id)
}

fn is_question(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::Question { .. })
}

fn is_round_result(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::CorrectAnswer { .. })
}

fn is_end_game(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::EndGame { .. })
}

mod lifecycle_tests {
    use super::*;

    /// Create + join + both ready: round 0 is dispatched to both players.
    #[tokio::test]
    async fn create_join_ready_starts_round_zero() {
        let addr = start_server(5, 5_000, 100).await;
        let (mut creator, mut joiner, _room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;

        for client in [&mut creator, &mut joiner] {
            match client.recv_matching(is_question).await {
                ServerMessage::Question {
                    round,
                    question,
                    options,
                } => {
                    assert_eq!(round, 0);
                    assert!(question.starts_with("test question"));
                    assert_eq!(options.len(), 4);
                }
                _ => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn connect_to_unknown_room_gets_null_game_id() {
        let addr = start_server(5, 5_000, 100).await;

        let mut client = TestClient::connect(addr).await;
        client.send(&ClientMessage::Connect { game_id: 77 }).await;

        match client.recv().await {
            ServerMessage::Status {
                game_id,
                list_of_players,
                ..
            } => {
                assert_eq!(game_id, None);
                assert!(list_of_players.is_empty());
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_to_started_room_gets_null_game_id() {
        let addr = start_server(5, 5_000, 100).await;
        let (mut creator, mut joiner, room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;
        creator.recv_matching(is_question).await;

        let mut late = TestClient::connect(addr).await;
        late.send(&ClientMessage::Connect { game_id: room_id })
            .await;
        match late.recv().await {
            ServerMessage::Status { game_id, .. } => assert_eq!(game_id, None),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_message_closes_connection() {
        let addr = start_server(5, 5_000, 100).await;

        let mut client = TestClient::connect(addr).await;
        client
            .writer
            .write_all(b"this is not json\n")
            .await
            .expect("send garbage");
        client.expect_closed().await;
    }
}

mod round_tests {
    use super::*;

    /// One correct answer, one player silent: the deadline closes the
    /// round with `curr_score = [1, 0]` and nobody departed.
    #[tokio::test]
    async fn unanswered_round_closes_at_deadline() {
        let addr = start_server(5, 400, 100).await;
        let (mut creator, mut joiner, _room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;
        creator.recv_matching(is_question).await;
        joiner.recv_matching(is_question).await;

        creator
            .send(&ClientMessage::Answer {
                round: 0,
                answer: Some(2),
            })
            .await;

        for client in [&mut creator, &mut joiner] {
            match client.recv_matching(is_round_result).await {
                ServerMessage::CorrectAnswer {
                    correct_answ,
                    curr_score,
                    deleted_players,
                } => {
                    assert_eq!(correct_answ, 2);
                    assert_eq!(curr_score, vec![1, 0]);
                    assert!(deleted_players.is_empty());
                }
                _ => unreachable!(),
            }
        }
    }

    /// A deliberate timeout (`answer: null`) still counts towards the
    /// round quorum, so the round completes before the deadline.
    #[tokio::test]
    async fn null_answers_complete_round_early() {
        let addr = start_server(5, 5_000, 100).await;
        let (mut creator, mut joiner, _room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;
        creator.recv_matching(is_question).await;
        joiner.recv_matching(is_question).await;

        creator
            .send(&ClientMessage::Answer {
                round: 0,
                answer: None,
            })
            .await;
        joiner
            .send(&ClientMessage::Answer {
                round: 0,
                answer: None,
            })
            .await;

        // Round time is 5s; only early completion gets a result in time.
        match creator.recv_matching(is_round_result).await {
            ServerMessage::CorrectAnswer { curr_score, .. } => {
                assert_eq!(curr_score, vec![0, 0]);
            }
            _ => unreachable!(),
        }
    }

    /// After a disconnect, the shrunk roster's single answer completes
    /// the round and the departed score rides along, frozen.
    #[tokio::test]
    async fn mid_game_disconnect_freezes_score() {
        let addr = start_server(2, 5_000, 100).await;
        let (mut creator, mut joiner, _room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;
        creator.recv_matching(is_question).await;
        joiner.recv_matching(is_question).await;

        // Round 0: creator right, joiner wrong.
        creator
            .send(&ClientMessage::Answer {
                round: 0,
                answer: Some(2),
            })
            .await;
        joiner
            .send(&ClientMessage::Answer {
                round: 0,
                answer: Some(0),
            })
            .await;
        creator.recv_matching(is_round_result).await;

        // The joiner drops before round 1.
        drop(joiner);
        tokio::time::sleep(Duration::from_millis(200)).await;

        match creator.recv_matching(is_question).await {
            ServerMessage::Question { round, .. } => assert_eq!(round, 1),
            _ => unreachable!(),
        }

        // Active roster is now just the creator: one answer closes it.
        creator
            .send(&ClientMessage::Answer {
                round: 1,
                answer: Some(2),
            })
            .await;
        match creator.recv_matching(is_round_result).await {
            ServerMessage::CorrectAnswer {
                curr_score,
                deleted_players,
                ..
            } => {
                assert_eq!(curr_score, vec![2]);
                assert_eq!(deleted_players.len(), 1);
                assert_eq!(deleted_players[0].id, 1);
                assert_eq!(deleted_players[0].score, 0);
            }
            _ => unreachable!(),
        }
    }
}

mod end_game_tests {
    use super::*;

    /// A full game: the consistently correct player wins with the full
    /// score, the other ends on zero.
    #[tokio::test]
    async fn full_game_reports_highest_scorer() {
        let rounds = 3;
        let addr = start_server(rounds, 5_000, 50).await;
        let (mut creator, mut joiner, _room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;

        for round in 0..rounds {
            creator.recv_matching(is_question).await;
            joiner.recv_matching(is_question).await;

            creator
                .send(&ClientMessage::Answer {
                    round,
                    answer: Some(2),
                })
                .await;
            joiner
                .send(&ClientMessage::Answer {
                    round,
                    answer: Some(1),
                })
                .await;

            creator.recv_matching(is_round_result).await;
            joiner.recv_matching(is_round_result).await;
        }

        for client in [&mut creator, &mut joiner] {
            match client.recv_matching(is_end_game).await {
                ServerMessage::EndGame { winner, curr_score } => {
                    assert_eq!(winner, Some(0));
                    assert_eq!(curr_score, vec![3, 0]);
                }
                _ => unreachable!(),
            }
        }
    }

    /// Equal top scores: both appear in `curr_score` and the winner field
    /// alone cannot disambiguate them.
    #[tokio::test]
    async fn tied_game_lists_both_top_scores() {
        let rounds = 2;
        let addr = start_server(rounds, 5_000, 50).await;
        let (mut creator, mut joiner, _room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;

        for round in 0..rounds {
            creator.recv_matching(is_question).await;
            joiner.recv_matching(is_question).await;
            for client in [&mut creator, &mut joiner] {
                client
                    .send(&ClientMessage::Answer {
                        round,
                        answer: Some(2),
                    })
                    .await;
            }
            creator.recv_matching(is_round_result).await;
            joiner.recv_matching(is_round_result).await;
        }

        match creator.recv_matching(is_end_game).await {
            ServerMessage::EndGame { winner, curr_score } => {
                assert_eq!(curr_score, vec![2, 2]);
                assert!(winner == Some(0) || winner == Some(1));
            }
            _ => unreachable!(),
        }
    }

    /// The server closes player connections once the game is over.
    #[tokio::test]
    async fn connections_close_after_game_ends() {
        let addr = start_server(1, 5_000, 50).await;
        let (mut creator, mut joiner, _room_id) = two_player_room(addr).await;

        creator.send(&ClientMessage::ReadyToStart).await;
        joiner.send(&ClientMessage::ReadyToStart).await;
        creator.recv_matching(is_question).await;

        creator
            .send(&ClientMessage::Answer {
                round: 0,
                answer: Some(2),
            })
            .await;
        joiner
            .send(&ClientMessage::Answer {
                round: 0,
                answer: None,
            })
            .await;

        creator.recv_matching(is_end_game).await;
        creator.expect_closed().await;
    }
}
