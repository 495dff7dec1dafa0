mod actions;
mod brain;
mod diff;
mod dom;
mod error;
mod executor;
mod hands;
mod history;
mod parser;
mod prompt;
mod turn;
mod types;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use brain::Brain;
use error::TurnError;
use hands::BrowserSession;
use history::TurnHistory;
use turn::Turn;
use types::PageSnapshot;

/// LLM-driven browser automation agent.
#[derive(Debug, Parser)]
#[command(name = "webhands")]
struct Args {
    /// The task to carry out in the browser.
    task: String,

    /// Maximum number of turns before giving up.
    #[arg(long, default_value_t = types::MAX_TURNS_DEFAULT)]
    max_turns: usize,

    /// Run Chrome without a visible window.
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut brain = Brain::new()?;

    // Chrome can take a while; launch it off the runtime.
    let headless = args.headless;
    let session = tokio::task::spawn_blocking(move || BrowserSession::launch(headless))
        .await
        .map_err(|e| anyhow::anyhow!("browser launch panicked: {e}"))??;

    let mut history = TurnHistory::default();

    for turn_number in 1..=args.max_turns {
        info!("----- turn {turn_number}/{} -----", args.max_turns);

        // 1. Observe: snapshot the page and rebuild its element index.
        let snapshot = {
            let tab = session.tab.clone();
            tokio::task::spawn_blocking(move || -> Result<PageSnapshot> {
                let url = hands::current_url(&tab);
                if url == "about:blank" {
                    return Ok(PageSnapshot::blank());
                }
                let raw_html = hands::content(&tab)?;
                Ok(PageSnapshot::from_page(&url, &raw_html))
            })
            .await??
        };
        if let Some((calls, _)) = history.current_page_actions() {
            debug!("actions already taken on this page:\n{calls}");
        }

        // 2. Decide: summarize progress, build the prompt, ask for one action.
        let summary = history.summarize(&mut brain).await?;
        let prompt = prompt::build(&args.task, &history, &snapshot, summary.as_deref());
        let llm_output = brain.complete(&prompt).await?;

        let mut turn = match Turn::construct(&prompt, &llm_output, snapshot.url.as_deref()) {
            Ok(turn) => turn,
            Err(parse_error) => {
                let error = TurnError::from(parse_error);
                error!("could not parse model output: {error}");
                history.save_turn(Turn::failed_parse(
                    &prompt,
                    &llm_output,
                    snapshot.url.as_deref(),
                    &error,
                ));
                continue;
            }
        };

        // 3. Act: execute the first captured call; the rest stay metadata.
        let call = turn.action_calls[0].clone();
        let report = {
            let tab = session.tab.clone();
            let snapshot = snapshot.clone();
            tokio::task::spawn_blocking(move || executor::run(&call, &snapshot, &tab)).await?
        };
        if let Some(failure) = &report.failure {
            error!("turn failed: {} ({})", failure.error, failure.action_text);
        }
        turn.apply(report);
        history.save_turn(turn);
    }

    info!(
        "turn limit reached after {} turns; total cost: ${:.6}",
        history.turns().len(),
        brain.usage().total_cost()
    );
    Ok(())
}
