pub mod coingecko;
pub mod feed;
pub mod source;

pub use source::MarketDataSource;
