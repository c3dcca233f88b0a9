use analysis_core::PricePoint;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of a time-to-target projection, in fractional months.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionHorizon {
    Months { months: f64 },
    Unreachable,
}

impl ProjectionHorizon {
    pub fn months(&self) -> Option<f64> {
        match self {
            ProjectionHorizon::Months { months } => Some(*months),
            ProjectionHorizon::Unreachable => None,
        }
    }
}

/// Compound annual growth rate between the first and last observation,
/// annualized by elapsed days / 365. The series is expected ascending
/// by date. `None` with fewer than 2 points, a non-positive start
/// price, or zero elapsed time.
pub fn cagr(series: &[PricePoint]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let first = series.first()?;
    let last = series.last()?;

    let start_price = first.close.to_f64()?;
    let end_price = last.close.to_f64()?;
    let years = (last.date - first.date).num_days() as f64 / 365.0;

    if start_price > 0.0 && years > 0.0 {
        Some((end_price / start_price).powf(1.0 / years) - 1.0)
    } else {
        None
    }
}

/// Monthly-equivalent rate of an annual growth rate. Zero when the rate
/// is undefined, zero, or at/below total loss (no monthly equivalent).
fn monthly_rate(cagr: Option<f64>) -> f64 {
    match cagr {
        Some(rate) if rate != 0.0 && rate > -1.0 => (1.0 + rate).powf(1.0 / 12.0) - 1.0,
        _ => 0.0,
    }
}

/// Future value of a lump sum plus a monthly annuity compounded at the
/// monthly equivalent of `cagr`. Degrades to linear accumulation when
/// the rate is zero or undefined.
pub fn projection_value(
    cagr: Option<f64>,
    start: Decimal,
    monthly_contribution: Decimal,
    months: u32,
) -> Decimal {
    let rate = monthly_rate(cagr);
    if rate == 0.0 {
        return start + monthly_contribution * Decimal::from(months);
    }

    let start_f = start.to_f64().unwrap_or(0.0);
    let contribution_f = monthly_contribution.to_f64().unwrap_or(0.0);
    let growth = (1.0 + rate).powi(months as i32);

    let fv_lump_sum = start_f * growth;
    let fv_annuity = contribution_f * ((growth - 1.0) / rate);
    Decimal::from_f64(fv_lump_sum + fv_annuity).unwrap_or(Decimal::ZERO)
}

/// Months required for the projected value to reach `target`, via the
/// closed-form logarithmic solution. `Months(0)` when the target is
/// already at or below `start`; `Unreachable` when the parameters make
/// convergence impossible.
pub fn projection_time(
    cagr: Option<f64>,
    start: Decimal,
    monthly_contribution: Decimal,
    target: Decimal,
) -> ProjectionHorizon {
    if target <= start {
        return ProjectionHorizon::Months { months: 0.0 };
    }

    let rate = monthly_rate(cagr);
    let start_f = start.to_f64().unwrap_or(0.0);
    let contribution_f = monthly_contribution.to_f64().unwrap_or(0.0);
    let target_f = target.to_f64().unwrap_or(0.0);

    if rate == 0.0 {
        if contribution_f <= 0.0 {
            return ProjectionHorizon::Unreachable;
        }
        return ProjectionHorizon::Months {
            months: (target_f - start_f) / contribution_f,
        };
    }

    let numerator = target_f * rate + contribution_f;
    let denominator = start_f * rate + contribution_f;
    if denominator <= 0.0 || numerator / denominator <= 0.0 {
        return ProjectionHorizon::Unreachable;
    }

    let months = (numerator / denominator).ln() / (1.0 + rate).ln();
    if months.is_finite() && months >= 0.0 {
        ProjectionHorizon::Months { months }
    } else {
        // A decaying rate with the target above start never converges.
        ProjectionHorizon::Unreachable
    }
}

/// Sustainable monthly income at the horizon: the projected value times
/// the monthly rate. Zero when the rate is zero or undefined — a flat
/// portfolio generates no income.
pub fn projection_income(
    cagr: Option<f64>,
    start: Decimal,
    monthly_contribution: Decimal,
    months: u32,
) -> Decimal {
    let rate = monthly_rate(cagr);
    if rate <= 0.0 {
        return Decimal::ZERO;
    }
    let value = projection_value(cagr, start, monthly_contribution, months);
    value * Decimal::from_f64(rate).unwrap_or(Decimal::ZERO)
}

/// Months until the portfolio sustains `target_income` per month, i.e.
/// until its value reaches `target_income / monthly_rate`.
pub fn projection_time_for_income(
    cagr: Option<f64>,
    start: Decimal,
    monthly_contribution: Decimal,
    target_income: Decimal,
) -> ProjectionHorizon {
    if target_income <= Decimal::ZERO {
        return ProjectionHorizon::Months { months: 0.0 };
    }

    let rate = monthly_rate(cagr);
    if rate <= 0.0 {
        return ProjectionHorizon::Unreachable;
    }

    let rate_dec = match Decimal::from_f64(rate) {
        Some(r) if r > Decimal::ZERO => r,
        _ => return ProjectionHorizon::Unreachable,
    };
    projection_time(cagr, start, monthly_contribution, target_income / rate_dec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn series(points: &[(i64, Decimal)]) -> Vec<PricePoint> {
        let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        points
            .iter()
            .map(|(day, close)| PricePoint {
                date: base + Duration::days(*day),
                close: *close,
                dividend: None,
            })
            .collect()
    }

    #[test]
    fn cagr_of_a_doubling_year_is_one() {
        let s = series(&[(0, dec!(10)), (365, dec!(20))]);
        let rate = cagr(&s).unwrap();
        assert!((rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cagr_requires_two_points_and_a_positive_start() {
        assert!(cagr(&series(&[(0, dec!(10))])).is_none());
        assert!(cagr(&series(&[(0, dec!(0)), (365, dec!(20))])).is_none());
        // Same-day observations have zero elapsed time.
        assert!(cagr(&series(&[(0, dec!(10)), (0, dec!(20))])).is_none());
    }

    #[test]
    fn zero_rate_projection_is_linear() {
        assert_eq!(
            projection_value(None, dec!(1000), dec!(100), 12),
            dec!(2200)
        );
        assert_eq!(
            projection_value(Some(0.0), dec!(1000), dec!(0), 24),
            dec!(1000)
        );
    }

    #[test]
    fn compounding_projection_beats_linear() {
        let value = projection_value(Some(0.10), dec!(1000), dec!(100), 12);
        assert!(value > dec!(2200));
    }

    #[test]
    fn projection_time_is_zero_when_target_already_met() {
        assert_eq!(
            projection_time(Some(0.10), dec!(1000), dec!(100), dec!(1000)),
            ProjectionHorizon::Months { months: 0.0 }
        );
    }

    #[test]
    fn projection_time_inverts_projection_value() {
        let cagr = Some(0.10);
        let target = projection_value(cagr, dec!(1000), dec!(100), 36);
        let months = projection_time(cagr, dec!(1000), dec!(100), target)
            .months()
            .unwrap();
        assert!((months - 36.0).abs() < 1e-6);
    }

    #[test]
    fn flat_portfolio_without_contributions_never_reaches_target() {
        assert_eq!(
            projection_time(None, dec!(1000), dec!(0), dec!(2000)),
            ProjectionHorizon::Unreachable
        );
    }

    #[test]
    fn decaying_portfolio_never_reaches_a_higher_target() {
        assert_eq!(
            projection_time(Some(-0.20), dec!(1000), dec!(0), dec!(2000)),
            ProjectionHorizon::Unreachable
        );
    }

    #[test]
    fn income_is_zero_without_growth() {
        assert_eq!(projection_income(None, dec!(1000), dec!(100), 12), dec!(0));
        assert_eq!(
            projection_time_for_income(None, dec!(1000), dec!(100), dec!(50)),
            ProjectionHorizon::Unreachable
        );
    }

    #[test]
    fn income_goal_resolves_to_the_equivalent_wealth_target() {
        let cagr = Some(0.12);
        let rate = (1.0f64 + 0.12).powf(1.0 / 12.0) - 1.0;
        let target_income = dec!(100);

        let direct = projection_time(
            cagr,
            dec!(1000),
            dec!(200),
            target_income / Decimal::from_f64(rate).unwrap(),
        );
        assert_eq!(
            projection_time_for_income(cagr, dec!(1000), dec!(200), target_income),
            direct
        );
    }
}
