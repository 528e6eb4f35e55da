use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub mod ask;
pub mod chat;

#[derive(Subcommand)]
enum Command {
    /// Ask a single question and print the completed answer
    Ask {
        /// The prompt to send
        prompt: String,

        /// Override the maximum number of continuation rounds
        #[arg(long)]
        max_rounds: Option<usize>,
    },
    /// Start an interactive chat session
    Chat {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Ask { prompt, max_rounds }) => {
            ask::run(&prompt, max_rounds).await?;
        }
        Some(Command::Chat {}) => {
            chat::run().await?;
        }
        None => {}
    }

    Ok(())
}
