//! Tokengate - token-gated chat-group membership verifier
//!
//! Wires the file store, the chat client and the provider chains together
//! and runs the re-verification sweep on its interval until Ctrl+C.

use tokengate::{AppConfig, BotApiChat, JsonFileStore, ProviderSet, ReverificationSweep};

use eyre::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let config = AppConfig::from_env();

    if !config.moralis_configured() {
        eprintln!("⚠️  WARNING: MORALIS_API_KEY not set or implausibly short!");
        eprintln!("   EVM balance lookups will fall back to Etherscan and public RPC.");
        eprintln!();
    }
    if config.owner_user_id.is_empty() {
        eprintln!("⚠️  WARNING: OWNER_USER_ID not set; owner bypass is disabled.");
        eprintln!();
    }

    let store: Arc<dyn tokengate::Store> = Arc::new(JsonFileStore::open(&config.data_dir)?);
    info!("💾 Data directory: {}", config.data_dir.display());

    let bot_token = config
        .bot_token
        .clone()
        .ok_or_else(|| eyre::eyre!("TELEGRAM_BOT_TOKEN must be set"))?;
    let chat: Arc<dyn tokengate::ChatPlatform> = Arc::new(BotApiChat::new(&bot_token)?);

    let providers = ProviderSet::from_config(&config);

    let sweep = ReverificationSweep::new(
        store,
        chat,
        providers.balances.clone(),
        config.owner_user_id.clone(),
    );

    info!(
        "🚀 Tokengate running, sweep every {}s",
        config.sweep_interval.as_secs()
    );
    let mut ticker = tokio::time::interval(config.sweep_interval);
    ticker.tick().await; // first tick fires immediately, skip it

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep.run().await {
                    tracing::error!("❌ [{}] Sweep failed: {}", e.code_str(), e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n🛑 Shutting down gracefully...");
                break;
            }
        }
    }

    Ok(())
}
