use serde::{Deserialize, Serialize};

/// One row of the `/coins/markets` response.
///
/// CoinGecko sends `null` for numeric fields on thinly traded coins, so
/// everything beyond the identity and price is optional. Read them through
/// the accessors, which treat a missing value as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_7d_in_currency: Option<f64>,
    #[serde(default)]
    pub sparkline_in_7d: Option<Sparkline>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub price: Vec<f64>,
}

impl Asset {
    pub fn price(&self) -> f64 {
        self.current_price.unwrap_or(0.0)
    }

    pub fn change_24h(&self) -> f64 {
        self.price_change_percentage_24h.unwrap_or(0.0)
    }

    pub fn change_7d(&self) -> Option<f64> {
        self.price_change_percentage_7d_in_currency
    }

    pub fn market_cap(&self) -> f64 {
        self.market_cap.unwrap_or(0.0)
    }

    pub fn volume(&self) -> f64 {
        self.total_volume.unwrap_or(0.0)
    }

    /// `(low, high)` over the last 24h, when CoinGecko reports both.
    pub fn range_24h(&self) -> Option<(f64, f64)> {
        self.low_24h.zip(self.high_24h)
    }

    pub fn sparkline(&self) -> &[f64] {
        self.sparkline_in_7d
            .as_ref()
            .map(|s| s.price.as_slice())
            .unwrap_or(&[])
    }

    /// Case-insensitive substring match on name or symbol. `needle` must
    /// already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.symbol.to_lowercase().contains(needle)
    }

    #[cfg(test)]
    pub fn sample(id: &str, name: &str, symbol: &str, price: f64, change: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            current_price: Some(price),
            price_change_percentage_24h: Some(change),
            market_cap: Some(price * 1_000_000.0),
            market_cap_rank: None,
            total_volume: Some(price * 10_000.0),
            high_24h: None,
            low_24h: None,
            price_change_percentage_7d_in_currency: None,
            sparkline_in_7d: None,
        }
    }
}

/// A `(timestamp_ms, price)` pair from `/coins/{id}/market_chart`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp_ms: i64,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarketChart {
    pub prices: Vec<[f64; 2]>,
}

impl MarketChart {
    pub fn into_points(self) -> Vec<PricePoint> {
        self.prices
            .into_iter()
            .map(|[ts, price]| PricePoint {
                timestamp_ms: ts as i64,
                price,
            })
            .collect()
    }
}
