use analysis_core::PricePoint;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lookback windows supported by the backtest, as fixed day counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookback {
    OneMonth,
    SixMonths,
    OneYear,
    FiveYears,
}

impl Lookback {
    pub fn days(&self) -> i64 {
        match self {
            Lookback::OneMonth => 30,
            Lookback::SixMonths => 180,
            Lookback::OneYear => 365,
            Lookback::FiveYears => 1825,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Lookback::OneMonth => "1M",
            Lookback::SixMonths => "6M",
            Lookback::OneYear => "1Y",
            Lookback::FiveYears => "5Y",
        }
    }
}

/// What a historical investment would be worth today, with and without
/// dividend reinvestment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Date of the series entry the position was opened at.
    pub initial_date: DateTime<Utc>,
    /// Closing price at that entry.
    pub initial_price: Decimal,
    /// Initial shares valued at the current price, dividends excluded.
    pub market_value: Decimal,
    /// Market value minus the invested amount.
    pub appreciation_value: Decimal,
    /// Dividends collected in cash over the holding period.
    pub dividends_value: Decimal,
    /// Market value plus cash dividends (no reinvestment).
    pub final_value_simple: Decimal,
    /// Invested amount plus cash dividends.
    pub initial_plus_dividends: Decimal,
    /// Terminal value with every dividend reinvested at that day's close.
    pub final_value_compound: Decimal,
    /// What reinvesting added over collecting dividends in cash.
    pub extra_return: Decimal,
}

/// Simulate investing `amount` at the series entry closest to
/// `now - lookback` and holding until `now` at `current_price`.
///
/// The simple leg keeps the initial share count and collects dividends
/// in cash; the compound leg buys fractional shares with every dividend
/// at that day's closing price before continuing forward.
///
/// Returns `None` when the series is empty or has no entry at or before
/// the lookback horizon.
pub fn backtest(
    series: &[PricePoint],
    current_price: Decimal,
    amount: Decimal,
    lookback: Lookback,
    now: DateTime<Utc>,
) -> Option<BacktestReport> {
    let target = now - Duration::days(lookback.days());

    // The series must reach back at least to the horizon.
    series.iter().find(|p| p.date <= target)?;

    let entry = series
        .iter()
        .min_by_key(|p| (p.date - target).num_seconds().abs())?;
    if entry.close <= Decimal::ZERO {
        return None;
    }

    let initial_shares = amount / entry.close;
    let mut total_dividends_per_share = Decimal::ZERO;
    let mut compound_shares = initial_shares;

    for point in series.iter().filter(|p| p.date >= entry.date) {
        if let Some(dividend) = point.dividend {
            if dividend > Decimal::ZERO && point.close > Decimal::ZERO {
                total_dividends_per_share += dividend;
                let payout = compound_shares * dividend;
                compound_shares += payout / point.close;
            }
        }
    }

    let market_value = initial_shares * current_price;
    let dividends_value = initial_shares * total_dividends_per_share;
    let final_value_simple = market_value + dividends_value;
    let final_value_compound = compound_shares * current_price;

    Some(BacktestReport {
        initial_date: entry.date,
        initial_price: entry.close,
        market_value,
        appreciation_value: market_value - amount,
        dividends_value,
        final_value_simple,
        initial_plus_dividends: amount + dividends_value,
        final_value_compound,
        extra_return: final_value_compound - final_value_simple,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn point(days_ago: i64, close: Decimal, dividend: Option<Decimal>) -> PricePoint {
        PricePoint {
            date: now() - Duration::days(days_ago),
            close,
            dividend,
        }
    }

    #[test]
    fn flat_prices_and_no_dividends_round_trip_the_amount() {
        let series = vec![
            point(400, dec!(50), None),
            point(200, dec!(50), None),
            point(1, dec!(50), None),
        ];

        let report = backtest(&series, dec!(50), dec!(1000), Lookback::OneYear, now()).unwrap();
        assert_eq!(report.final_value_simple, dec!(1000));
        assert_eq!(report.final_value_compound, dec!(1000));
        assert_eq!(report.appreciation_value, dec!(0));
        assert_eq!(report.extra_return, dec!(0));
    }

    #[test]
    fn picks_the_entry_closest_to_the_horizon() {
        let series = vec![
            point(400, dec!(10), None),
            point(300, dec!(20), None),
            point(1, dec!(30), None),
        ];

        // 1Y horizon = 365 days ago: |400-365| = 35 beats |300-365| = 65.
        let report = backtest(&series, dec!(30), dec!(100), Lookback::OneYear, now()).unwrap();
        assert_eq!(report.initial_price, dec!(10));
        assert_eq!(report.initial_date, now() - Duration::days(400));
    }

    #[test]
    fn series_starting_after_the_horizon_yields_none() {
        let series = vec![point(40, dec!(10), None), point(1, dec!(12), None)];
        assert!(backtest(&series, dec!(12), dec!(100), Lookback::OneYear, now()).is_none());
        // The same series does reach back far enough for one month.
        assert!(backtest(&series, dec!(12), dec!(100), Lookback::OneMonth, now()).is_some());
    }

    #[test]
    fn empty_series_yields_none() {
        assert!(backtest(&[], dec!(10), dec!(100), Lookback::OneMonth, now()).is_none());
    }

    #[test]
    fn dividends_accrue_without_reinvestment_in_the_simple_leg() {
        let series = vec![
            point(40, dec!(100), None),
            point(20, dec!(100), Some(dec!(5))),
            point(1, dec!(100), None),
        ];

        // 10 shares collect 5 per share in cash.
        let report = backtest(&series, dec!(100), dec!(1000), Lookback::OneMonth, now()).unwrap();
        assert_eq!(report.dividends_value, dec!(50));
        assert_eq!(report.final_value_simple, dec!(1050));
        assert_eq!(report.initial_plus_dividends, dec!(1050));
    }

    #[test]
    fn reinvested_dividends_buy_fractional_shares() {
        let series = vec![
            point(40, dec!(100), None),
            point(20, dec!(50), Some(dec!(5))),
            point(1, dec!(100), None),
        ];

        // 10 initial shares; the 5/share payout buys 50/50 = 1 extra
        // share at the depressed close, worth 100 at the end.
        let report = backtest(&series, dec!(100), dec!(1000), Lookback::OneMonth, now()).unwrap();
        assert_eq!(report.final_value_compound, dec!(1100));
        assert_eq!(report.final_value_simple, dec!(1050));
        assert_eq!(report.extra_return, dec!(50));
    }
}
