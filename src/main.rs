//! quote-refresh - Rate-limited stock position tracker
//!
//! Keeps a batch of positions priced from Alpha Vantage without exceeding the
//! provider's call quota.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use quote_refresh::adapters::cli::{self, render_history, render_snapshot, Command, HistoryCmd, QuoteCmd, WatchCmd};
use quote_refresh::adapters::QuoteClient;
use quote_refresh::application::{
    PositionRefresher, RateLimitedTaskQueue, RefreshPipeline, RefreshScheduler,
};
use quote_refresh::config::{load_config_or_default, Config};
use quote_refresh::domain::Ticker;
use quote_refresh::ports::QuotePort;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (the API key goes here, not in the config file)
    dotenvy::dotenv().ok();

    let app = cli::init();

    let config_path = match &app.command {
        Command::Watch(cmd) => cmd.config.clone(),
        Command::Quote(cmd) => cmd.config.clone(),
        Command::History(cmd) => cmd.config.clone(),
    };
    let config = load_config_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Watch(cmd) => watch_command(cmd, config).await,
        Command::Quote(cmd) => quote_command(cmd, config).await,
        Command::History(cmd) => history_command(cmd, config).await,
    }
}

fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured))
            .context("Invalid logging.level")?
    };

    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn build_client(config: &Config) -> Result<(Arc<QuoteClient>, RateLimitedTaskQueue)> {
    let settings = config.alpha_vantage()?;
    let client = QuoteClient::new(settings).context("Failed to create Alpha Vantage client")?;
    let queue = RateLimitedTaskQueue::new(config.min_call_interval());
    Ok((Arc::new(client), queue))
}

async fn watch_command(cmd: WatchCmd, config: Config) -> Result<()> {
    let mut positions = config.seed_positions()?;
    positions.extend(cmd.positions);
    if positions.is_empty() {
        anyhow::bail!("No positions to watch: add [[positions]] to the config or pass --position");
    }

    let (client, queue) = build_client(&config)?;
    tracing::info!("Watching {} positions via {}", positions.len(), client.base_url());

    let refresher = PositionRefresher::new(client, queue);
    let scheduler = RefreshScheduler::with_tokio_clock(config.cooldown());
    let pipeline = RefreshPipeline::new(refresher, scheduler);

    let mut snapshots = pipeline.subscribe();
    pipeline
        .seed(positions)
        .context("Duplicate ticker in watch list")?;
    pipeline.start_timer(config.tick_interval());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                println!("{}", render_snapshot(&snapshot));
            }
        }
    }

    pipeline.shutdown();
    Ok(())
}

async fn quote_command(cmd: QuoteCmd, config: Config) -> Result<()> {
    let ticker = Ticker::parse(&cmd.ticker)?;
    let (client, queue) = build_client(&config)?;

    let symbol = ticker.clone();
    let price = queue
        .submit(move || async move { client.fetch_price(&symbol).await })
        .await?
        .with_context(|| format!("Failed to fetch quote for {}", ticker))?;

    println!("{}: ${:.2}", ticker, price);
    Ok(())
}

async fn history_command(cmd: HistoryCmd, config: Config) -> Result<()> {
    let ticker = Ticker::parse(&cmd.ticker)?;
    let (client, queue) = build_client(&config)?;

    let symbol = ticker.clone();
    let series = queue
        .submit(move || async move { client.fetch_daily(&symbol).await })
        .await?
        .with_context(|| format!("Failed to fetch daily history for {}", ticker))?;

    print!("{}", render_history(ticker.as_str(), &series, cmd.limit));
    Ok(())
}
