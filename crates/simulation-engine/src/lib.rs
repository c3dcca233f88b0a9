//! Pure financial series math: CAGR, dividend-aware backtests, and
//! forward projections. Everything here is side-effect free and
//! operates on caller-owned price series.

pub mod backtest;
pub mod projection;

pub use backtest::{backtest, BacktestReport, Lookback};
pub use projection::{
    cagr, projection_income, projection_time, projection_time_for_income, projection_value,
    ProjectionHorizon,
};
