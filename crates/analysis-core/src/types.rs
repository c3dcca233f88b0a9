use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One tradable asset, identified by its ticker symbol.
/// Symbols are uppercased on construction and unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            name: name.into(),
        }
    }
}

/// One observation of a daily price series: closing price plus the
/// dividend paid per share on that date, if any. Series are ascending
/// by date with no duplicate dates, owned by the caller and read-only
/// to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub close: Decimal,
    #[serde(default)]
    pub dividend: Option<Decimal>,
}

/// Report flavor requested from the narrative provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Full,
    Technical,
    Fundamental,
    Dividends,
    Sentiment,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Full => "full",
            AnalysisKind::Technical => "technical",
            AnalysisKind::Fundamental => "fundamental",
            AnalysisKind::Dividends => "dividends",
            AnalysisKind::Sentiment => "sentiment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Some(AnalysisKind::Full),
            "technical" => Some(AnalysisKind::Technical),
            "fundamental" => Some(AnalysisKind::Fundamental),
            "dividends" => Some(AnalysisKind::Dividends),
            "sentiment" => Some(AnalysisKind::Sentiment),
            _ => None,
        }
    }
}

/// How much history to request from the market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryRange {
    OneMonth,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
}

impl HistoryRange {
    /// Window size in days.
    pub fn days(&self) -> i64 {
        match self {
            HistoryRange::OneMonth => 30,
            HistoryRange::SixMonths => 180,
            HistoryRange::OneYear => 365,
            HistoryRange::TwoYears => 730,
            HistoryRange::FiveYears => 1825,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryRange::OneMonth => "1M",
            HistoryRange::SixMonths => "6M",
            HistoryRange::OneYear => "1Y",
            HistoryRange::TwoYears => "2Y",
            HistoryRange::FiveYears => "5Y",
        }
    }
}

/// One record of the machine-readable ranking block a joint-analysis
/// response may embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSignal {
    pub symbol: String,
    pub signal: String,
    pub score: i32,
}

/// A completed per-symbol report handed to the joint-analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointEntry {
    pub symbol: String,
    pub content: String,
}
