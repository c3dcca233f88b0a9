use std::env;

use analysis_core::AnalysisKind;
use anyhow::{Context, Result};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Symbols to analyze, in leaderboard tie-break order.
    pub watchlist: Vec<String>,

    // Rate limiting
    pub cooldown_secs: u64,       // 30s after every analysis call
    pub retry_backoff_secs: u64,  // 60s before a failed job retries
    pub max_retries: u8,          // 2 attempts per job

    // Ranking
    pub ranking_notional: Decimal,
    pub analysis_kind: AnalysisKind,

    // External APIs
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: Option<String>,
    pub chart_base_url: Option<String>,
    pub chart_cache_ttl_secs: i64,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let watchlist: Vec<String> = env::var("WATCHLIST")
            .unwrap_or_else(|_| "PETR4,VALE3,ITUB4,BBAS3,WEGE3".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let analysis_kind = match env::var("BATCH_ANALYSIS_KIND") {
            Ok(value) => AnalysisKind::parse(&value)
                .with_context(|| format!("Unknown BATCH_ANALYSIS_KIND: {value}"))?,
            Err(_) => AnalysisKind::Full,
        };

        let config = Self {
            watchlist,

            cooldown_secs: env::var("BATCH_COOLDOWN_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            retry_backoff_secs: env::var("BATCH_RETRY_BACKOFF_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            max_retries: env::var("BATCH_MAX_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,

            ranking_notional: env::var("RANKING_NOTIONAL")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            analysis_kind,

            gemini_api_key: env::var("GEMINI_API_KEY")
                .context("GEMINI_API_KEY not set")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL").ok(),
            chart_base_url: env::var("CHART_BASE_URL").ok(),
            chart_cache_ttl_secs: env::var("CHART_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
        };

        Ok(config)
    }
}
