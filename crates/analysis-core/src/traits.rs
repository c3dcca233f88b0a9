use async_trait::async_trait;

use crate::{AnalysisError, AnalysisKind, HistoryRange, JointEntry, PricePoint};

/// Trait for market-data providers: given a symbol and a period, return
/// an ordered price/dividend series.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_price_series(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Vec<PricePoint>, AnalysisError>;
}

/// Trait for narrative-analysis providers (an LLM behind an HTTP API).
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Generate one free-text analysis report for a single symbol.
    async fn request_narrative(
        &self,
        symbol: &str,
        kind: AnalysisKind,
    ) -> Result<String, AnalysisError>;

    /// Generate one joint analysis over all completed per-symbol
    /// reports. Returns the raw response text; the caller extracts the
    /// narrative and any embedded ranking block.
    async fn request_joint(&self, entries: &[JointEntry]) -> Result<String, AnalysisError>;
}
