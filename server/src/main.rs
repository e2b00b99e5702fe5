use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::network::Server;
use server::questions::QuestionBank;
use server::registry::Registry;
use std::path::PathBuf;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, builds the registry, and runs the
/// accept loop until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about = "Real-time multiplayer trivia server")]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
        port: u16,
        /// Maximum players per room
        #[clap(long, default_value_t = shared::MAX_PLAYERS_PER_ROOM)]
        max_players: usize,
        /// Rounds per game
        #[clap(long, default_value_t = shared::TOTAL_ROUNDS)]
        rounds: usize,
        /// Seconds a round stays open for answers
        #[clap(long, default_value_t = shared::ROUND_TIME_SECS)]
        round_secs: u64,
        /// Seconds between a round result and the next question
        #[clap(long, default_value_t = shared::INTER_ROUND_DELAY_SECS)]
        delay_secs: u64,
        /// Optional JSON file with the question pool
        #[clap(long)]
        questions: Option<PathBuf>,
    }

    env_logger::init();
    let args = Args::parse();

    let bank = match &args.questions {
        Some(path) => {
            let input = std::fs::read_to_string(path)?;
            let bank = QuestionBank::from_json(&input)?;
            info!("loaded {} questions from {}", bank.len(), path.display());
            bank
        }
        None => QuestionBank::builtin(),
    };

    let config = GameConfig {
        max_players: args.max_players,
        rounds: args.rounds,
        round_time: Duration::from_secs(args.round_secs),
        inter_round_delay: Duration::from_secs(args.delay_secs),
    };

    let registry = Registry::new(config, bank);
    let server = Server::bind(&format!("{}:{}", args.host, args.port), registry).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
