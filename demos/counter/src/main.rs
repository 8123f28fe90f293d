//! Counter terminal binary
//!
//! Renders every state and notice of the counter container and reads
//! intents from stdin:
//!
//! - `+` or `i`: increment
//! - `r`: reset
//! - `s`: save now
//! - `q`: quit

use counter::{CounterConfig, CounterContainer, CounterEnvironment, CounterIntent, CounterNotice};
use mvi_core::environment::SystemRandom;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing (stderr keeps stdout for the screen)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter=info,mvi_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CounterConfig::from_env();
    tracing::info!(cache = %config.cache_path.display(), "Loaded configuration");

    let environment = CounterEnvironment::new(SystemRandom, config.tick_bound);
    let container = CounterContainer::start(&config, environment).await;

    let mut states = container.subscribe();
    let mut notices = container.notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("=== Counter ===");
    println!("Commands: + (increment), r (reset), s (save), q (quit)\n");
    println!("{}", container.state());

    loop {
        tokio::select! {
            state = states.next() => match state {
                Some(state) => {
                    println!("{state}");
                    if !state.is_content() {
                        println!("Intents are ignored until restart");
                    }
                },
                None => break,
            },
            notice = notices.recv() => match notice {
                Ok(CounterNotice::ShowMessage { text }) => println!(">> {text}"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Missed notices"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "+" | "i" => container.submit(CounterIntent::Increment)?,
                    "r" => container.submit(CounterIntent::Reset)?,
                    "s" => container.save_now()?,
                    "q" => break,
                    "" => {},
                    other => println!("Unknown command: {other}"),
                }
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            },
        }
    }

    // Leaving the screen stops the ticker and saves
    drop(states);
    container.shutdown().await?;
    println!("Bye. Last state: {}", container.state());
    Ok(())
}
