//! HTTP client for a Yahoo-chart-style market-data API. Fetches daily
//! price/dividend history and decodes it into the core `PricePoint`
//! series consumed by the analysis pipeline.

use std::collections::HashMap;
use std::time::Duration;

use analysis_core::{AnalysisError, HistoryRange, MarketDataProvider, PricePoint};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use dashmap::DashMap;
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_CACHE_TTL_SECS: i64 = 300; // 5 minutes

/// Cached series with fetch timestamp.
struct CacheEntry {
    data: Vec<PricePoint>,
    cached_at: DateTime<Utc>,
}

pub struct YahooClient {
    client: Client,
    base_url: String,
    cache_ttl_secs: i64,
    series_cache: DashMap<String, CacheEntry>,
}

impl YahooClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            series_cache: DashMap::new(),
        }
    }

    /// Point the client at a different endpoint (stub server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl_secs: i64) -> Self {
        self.cache_ttl_secs = ttl_secs;
        self
    }

    /// Get daily price/dividend history for a symbol (cached, 5-min TTL).
    /// The five-year range uses weekly bars to keep the payload small.
    pub async fn get_history(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        let yahoo_symbol = normalize_symbol(symbol);

        let cache_key = format!("{}:{}", yahoo_symbol, range.label());
        if let Some(entry) = self.series_cache.get(&cache_key) {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            if age < self.cache_ttl_secs {
                return Ok(entry.data.clone());
            }
        }

        let now = Utc::now();
        let from = now - ChronoDuration::days(range.days());
        let interval = if range == HistoryRange::FiveYears {
            "1wk"
        } else {
            "1d"
        };

        let url = format!("{}/v8/finance/chart/{}", self.base_url, yahoo_symbol);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", from.timestamp().to_string()),
                ("period2", now.timestamp().to_string()),
                ("interval", interval.to_string()),
                ("events", "div".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(AnalysisError::NotFound(format!(
                "No chart data for {yahoo_symbol}"
            )));
        }
        if status.as_u16() == 429 {
            return Err(AnalysisError::RateLimited(format!(
                "Chart API throttled request for {yahoo_symbol}"
            )));
        }
        if !status.is_success() {
            return Err(AnalysisError::Upstream(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        let points = decode_chart(chart)?;
        if points.is_empty() {
            return Err(AnalysisError::NotFound(format!(
                "Empty price series for {yahoo_symbol}"
            )));
        }

        tracing::debug!(
            "Fetched {} price points for {} ({})",
            points.len(),
            yahoo_symbol,
            range.label()
        );

        self.series_cache.insert(
            cache_key,
            CacheEntry {
                data: points.clone(),
                cached_at: Utc::now(),
            },
        );

        Ok(points)
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn fetch_price_series(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        self.get_history(symbol, range).await
    }
}

/// Uppercase the ticker and append the B3 exchange suffix when absent.
pub fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if upper.ends_with(".SA") {
        upper
    } else {
        format!("{upper}.SA")
    }
}

/// Decode a chart payload into an ascending price series. Entries
/// without a close are skipped; dividend events are merged onto the
/// entry of the same calendar day.
fn decode_chart(response: ChartResponse) -> Result<Vec<PricePoint>, AnalysisError> {
    if let Some(error) = response.chart.error {
        return Err(AnalysisError::NotFound(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let result = response
        .chart
        .result
        .and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.remove(0))
            }
        })
        .ok_or_else(|| AnalysisError::InvalidResponse("Chart result missing".to_string()))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let dividends: HashMap<NaiveDate, Decimal> = result
        .events
        .map(|events| {
            events
                .dividends
                .into_values()
                .filter_map(|d| {
                    let date = DateTime::from_timestamp(d.date, 0)?.date_naive();
                    Some((date, Decimal::from_f64(d.amount)?))
                })
                .collect()
        })
        .unwrap_or_default();

    let points = result
        .timestamp
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(ts, 0)?;
            let close = Decimal::from_f64(close?)?;
            Some(PricePoint {
                date,
                close,
                dividend: dividends.get(&date.date_naive()).copied(),
            })
        })
        .collect();

    Ok(points)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartNode,
}

#[derive(Debug, Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartErrorNode>,
}

#[derive(Debug, Deserialize)]
struct ChartErrorNode {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
    events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}
