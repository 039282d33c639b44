use crate::state::snapshot::MarketSnapshot;

/// Aggregates shown in the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarketStats {
    pub total_market_cap: f64,
    pub total_volume: f64,
    pub avg_change_24h: f64,
    pub gainers: usize,
    pub losers: usize,
}

impl MarketStats {
    pub fn from_snapshot(snapshot: &MarketSnapshot) -> Self {
        let assets = snapshot.assets();
        if assets.is_empty() {
            return Self::default();
        }

        let total_market_cap = assets.iter().map(|a| a.market_cap()).sum();
        let total_volume = assets.iter().map(|a| a.volume()).sum();
        let avg_change_24h =
            assets.iter().map(|a| a.change_24h()).sum::<f64>() / assets.len() as f64;
        let gainers = assets.iter().filter(|a| a.change_24h() > 0.0).count();

        Self {
            total_market_cap,
            total_volume,
            avg_change_24h,
            gainers,
            losers: assets.len() - gainers,
        }
    }
}
