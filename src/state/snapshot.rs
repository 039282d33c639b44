use chrono::{DateTime, Local};

use crate::models::Asset;

/// The assets returned by one fetch. Replaced wholesale, never patched.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    assets: Vec<Asset>,
    received_at: DateTime<Local>,
}

impl MarketSnapshot {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            received_at: Local::now(),
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn find(&self, asset_id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == asset_id)
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for MarketSnapshot {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
