use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};

use page_scout::{repl, server, AppState, Scout, ScoutConfig};

#[derive(Debug, Parser)]
#[command(name = "page-scout", version, about = "Fetch a page, extract it, ask about it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive loop: enter a URL, read the extraction, ask questions (default).
    Repl,
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "PAGE_SCOUT_PORT", default_value_t = 5000)]
        port: u16,
    },
    /// Fetch one page and print its extraction as JSON.
    Extract { url: String },
    /// Fetch one page and answer a question about it.
    Ask { url: String, question: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ScoutConfig::load().map_err(|e| {
        error!("{}", e);
        e
    })?;
    info!(
        "Using model {} at {}",
        config.llm.model,
        config.llm.base_url.as_str()
    );
    let scout = Scout::from_config(&config)?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => {
            let stdin = BufReader::new(tokio::io::stdin());
            repl::run(&scout, stdin, tokio::io::stdout()).await?;
        }
        Command::Serve { port } => {
            let state = Arc::new(AppState::new(scout));
            server::serve(state, port).await?;
        }
        Command::Extract { url } => {
            let session = scout.open(&url).await?;
            let extraction = session.extract().await?;
            println!("{}", serde_json::to_string_pretty(&extraction)?);
        }
        Command::Ask { url, question } => {
            let session = scout.open(&url).await?;
            let answer = session
                .answer(&question)
                .await
                .with_context(|| format!("answering from {}", session.url()))?;
            println!("{}", answer);
        }
    }

    Ok(())
}
