//! Consolidated ranking: converts per-instrument multi-period returns
//! into a point-scored leaderboard.

use analysis_core::PricePoint;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simulation_engine::{backtest, Lookback};

/// Points awarded per rank position within each period.
pub const POINTS_TABLE: [u32; 12] = [15, 12, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1];

/// Published leaderboard length, also the per-period scoring depth.
pub const LEADERBOARD_SIZE: usize = 12;

/// Percent return of one instrument over three lookback windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPeriodReturn {
    pub one_month: f64,
    pub six_months: f64,
    pub one_year: f64,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub symbol: String,
    pub score: u32,
    pub returns: MultiPeriodReturn,
}

/// Percent return of the dividend-reinvested backtest over each window,
/// against the series' latest close. Windows without usable data
/// contribute zero — they neither benefit nor penalize the instrument.
pub fn multi_period_return(
    series: &[PricePoint],
    notional: Decimal,
    now: DateTime<Utc>,
) -> MultiPeriodReturn {
    let Some(current_price) = series.last().map(|p| p.close) else {
        return MultiPeriodReturn::default();
    };

    let pct = |lookback| {
        backtest(series, current_price, notional, lookback, now)
            .map(|report| {
                (report.final_value_compound - notional) / notional * Decimal::ONE_HUNDRED
            })
            .and_then(|d| d.to_f64())
            .unwrap_or(0.0)
    };

    MultiPeriodReturn {
        one_month: pct(Lookback::OneMonth),
        six_months: pct(Lookback::SixMonths),
        one_year: pct(Lookback::OneYear),
    }
}

/// Score instruments by summed per-period points and return the top of
/// the table. Input order is the run's insertion order; the final sort
/// is stable, so instruments tied on total score keep that order.
pub fn rank(performances: &[(String, MultiPeriodReturn)]) -> Vec<RankEntry> {
    if performances.is_empty() {
        return Vec::new();
    }

    let periods: [fn(&MultiPeriodReturn) -> f64; 3] = [
        |m| m.one_month,
        |m| m.six_months,
        |m| m.one_year,
    ];

    let mut scores = vec![0u32; performances.len()];
    for period in periods {
        let mut order: Vec<usize> = (0..performances.len()).collect();
        order.sort_by(|&a, &b| {
            period(&performances[b].1)
                .partial_cmp(&period(&performances[a].1))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Only the period's top of the table scores; a lone spike in
        // one window cannot carry a mediocre instrument.
        for (position, &idx) in order.iter().take(POINTS_TABLE.len()).enumerate() {
            scores[idx] += POINTS_TABLE[position];
        }
    }

    let mut entries: Vec<RankEntry> = performances
        .iter()
        .zip(scores)
        .map(|((symbol, returns), score)| RankEntry {
            symbol: symbol.clone(),
            score,
            returns: *returns,
        })
        .collect();

    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(LEADERBOARD_SIZE);
    entries
}
