pub mod error;
pub mod traits;
pub mod types;

pub use error::AnalysisError;
pub use traits::{MarketDataProvider, NarrativeProvider};
pub use types::{
    AnalysisKind, HistoryRange, Instrument, JointEntry, PricePoint, RankedSignal,
};
