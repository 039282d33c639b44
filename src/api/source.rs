use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Asset, PricePoint};

/// Upstream market data. Every failure comes back as
/// [`CoinPulseError::FetchFailed`](crate::error::CoinPulseError::FetchFailed).
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Top `limit` assets by market cap.
    async fn fetch_snapshot(&self, limit: usize) -> Result<Vec<Asset>>;

    /// `(timestamp, price)` pairs covering the last `days` days.
    async fn fetch_series(&self, asset_id: &str, days: u32) -> Result<Vec<PricePoint>>;

    /// A single asset, or `None` if the API does not know the id.
    async fn fetch_asset(&self, asset_id: &str) -> Result<Option<Asset>>;
}
