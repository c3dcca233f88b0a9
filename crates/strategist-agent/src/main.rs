use std::sync::Arc;

use ai_client::GeminiClient;
use analysis_core::{Instrument, MarketDataProvider, NarrativeProvider};
use anyhow::Result;
use batch_analysis::{BatchConfig, BatchScheduler, JobState, RunPhase, RunSnapshot};
use yahoo_client::YahooClient;

mod config;

use config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Portfolio Strategist Agent");

    // 2. Load configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Watchlist: {} symbols", config.watchlist.len());
    tracing::info!("  Model: {}", config.gemini_model);
    tracing::info!("  Analysis kind: {}", config.analysis_kind.as_str());
    tracing::info!(
        "  Cooldown: {}s | Retry backoff: {}s | Max retries: {}",
        config.cooldown_secs,
        config.retry_backoff_secs,
        config.max_retries
    );

    // 3. Market-data client (shared between prompts and ranking)
    let mut yahoo = YahooClient::new().with_cache_ttl(config.chart_cache_ttl_secs);
    if let Some(url) = &config.chart_base_url {
        yahoo = yahoo.with_base_url(url.clone());
    }
    let market_data: Arc<dyn MarketDataProvider> = Arc::new(yahoo);

    // 4. Narrative provider
    let mut gemini = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        Arc::clone(&market_data),
    );
    if let Some(url) = &config.gemini_base_url {
        gemini = gemini.with_base_url(url.clone());
    }
    let narrative: Arc<dyn NarrativeProvider> = Arc::new(gemini);

    // 5. Scheduler
    let batch_config = BatchConfig {
        call_cooldown_secs: config.cooldown_secs,
        retry_backoff_secs: config.retry_backoff_secs,
        max_retries: config.max_retries,
        ranking_notional: config.ranking_notional,
        analysis_kind: config.analysis_kind,
    };
    let scheduler = BatchScheduler::new(market_data, narrative, batch_config);

    let instruments: Vec<Instrument> = config
        .watchlist
        .iter()
        .map(|symbol| Instrument::new(symbol, symbol))
        .collect();

    tracing::info!(
        "Running batch analysis over {} instruments. Press Ctrl+C to abort.",
        instruments.len()
    );

    // 6. Drive the run; Ctrl+C abandons it gracefully
    tokio::select! {
        result = scheduler.run(instruments) => {
            let snapshot = result?;
            report(&snapshot);
            if snapshot.phase == RunPhase::JointFailed {
                anyhow::bail!("Run ended without a joint analysis");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, abandoning the run");
        }
    }

    Ok(())
}

/// Print the final run artifacts: per-job outcomes, the consolidated
/// leaderboard, and the joint strategy narrative.
fn report(snapshot: &RunSnapshot) {
    tracing::info!(
        "Run finished: {} completed, {} failed",
        snapshot.completed_count(),
        snapshot.failed_count()
    );

    for job in &snapshot.jobs {
        match job.state {
            JobState::Completed => tracing::info!("  {} analyzed", job.symbol),
            JobState::Failed => tracing::warn!(
                "  {} failed after {} attempts: {}",
                job.symbol,
                job.retries,
                job.error.as_deref().unwrap_or("unknown error")
            ),
            _ => tracing::warn!("  {} did not settle", job.symbol),
        }
    }

    if !snapshot.leaderboard.is_empty() {
        println!("\nConsolidated ranking (1M / 6M / 1Y):");
        for (position, entry) in snapshot.leaderboard.iter().enumerate() {
            println!(
                "{:>3}. {:<8} {:>4} pts  ({:+.1}% / {:+.1}% / {:+.1}%)",
                position + 1,
                entry.symbol,
                entry.score,
                entry.returns.one_month,
                entry.returns.six_months,
                entry.returns.one_year
            );
        }
    }

    if let Some(joint) = &snapshot.joint {
        println!("\n{}", joint.narrative());
        if !joint.ranking().is_empty() {
            println!("\nModel ranking:");
            for signal in joint.ranking() {
                println!(
                    "  {:<8} {:<6} score {}",
                    signal.symbol, signal.signal, signal.score
                );
            }
        }
    }
}
