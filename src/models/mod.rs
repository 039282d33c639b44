pub mod asset;

pub use asset::{Asset, PricePoint, Sparkline};
pub(crate) use asset::MarketChart;
