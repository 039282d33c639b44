use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::api::source::MarketDataSource;
use crate::models::{Asset, PricePoint};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub snapshot_limit: usize,
    pub refresh_interval: Duration,
}

/// What the refresh task reports back to the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Loading,
    Snapshot(Vec<Asset>),
    FetchFailed(String),
    Series {
        asset_id: String,
        days: u32,
        points: Vec<PricePoint>,
    },
    SeriesFailed {
        asset_id: String,
        message: String,
    },
    /// `None` when CoinGecko no longer lists the coin.
    Asset {
        asset_id: String,
        asset: Option<Asset>,
    },
    AssetFailed {
        asset_id: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    RefreshNow,
    LoadSeries { asset_id: String, days: u32 },
    LoadAsset { asset_id: String },
}

/// Polls `source` every `refresh_interval`, starting immediately.
///
/// Fetches run one at a time: a slow response delays the next tick instead
/// of overlapping it, so snapshots reach the dashboard in request order.
/// Returns once either channel is closed.
pub async fn poll_markets(
    source: Arc<dyn MarketDataSource>,
    config: FeedConfig,
    events: mpsc::Sender<FeedEvent>,
    mut commands: mpsc::Receiver<FeedCommand>,
) {
    info!(
        "Polling top {} assets every {:?}",
        config.snapshot_limit, config.refresh_interval
    );

    let mut ticker = time::interval(config.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let alive = tokio::select! {
            _ = ticker.tick() => refresh(source.as_ref(), &config, &events).await,
            command = commands.recv() => match command {
                Some(FeedCommand::RefreshNow) => {
                    let alive = refresh(source.as_ref(), &config, &events).await;
                    ticker.reset();
                    alive
                }
                Some(FeedCommand::LoadSeries { asset_id, days }) => {
                    load_series(source.as_ref(), asset_id, days, &events).await
                }
                Some(FeedCommand::LoadAsset { asset_id }) => {
                    load_asset(source.as_ref(), asset_id, &events).await
                }
                None => false,
            },
        };

        if !alive {
            break;
        }
    }

    info!("Market feed stopped");
}

async fn refresh(
    source: &dyn MarketDataSource,
    config: &FeedConfig,
    events: &mpsc::Sender<FeedEvent>,
) -> bool {
    if events.send(FeedEvent::Loading).await.is_err() {
        return false;
    }

    let event = match source.fetch_snapshot(config.snapshot_limit).await {
        Ok(assets) => {
            debug!("Fetched {} assets", assets.len());
            FeedEvent::Snapshot(assets)
        }
        Err(e) => {
            warn!("{}", e);
            FeedEvent::FetchFailed(e.to_string())
        }
    };

    events.send(event).await.is_ok()
}

async fn load_series(
    source: &dyn MarketDataSource,
    asset_id: String,
    days: u32,
    events: &mpsc::Sender<FeedEvent>,
) -> bool {
    let event = match source.fetch_series(&asset_id, days).await {
        Ok(points) => {
            debug!("Fetched {} chart points for {}", points.len(), asset_id);
            FeedEvent::Series {
                asset_id,
                days,
                points,
            }
        }
        Err(e) => {
            warn!("{}", e);
            FeedEvent::SeriesFailed {
                asset_id,
                message: e.to_string(),
            }
        }
    };

    events.send(event).await.is_ok()
}

async fn load_asset(
    source: &dyn MarketDataSource,
    asset_id: String,
    events: &mpsc::Sender<FeedEvent>,
) -> bool {
    let event = match source.fetch_asset(&asset_id).await {
        Ok(asset) => {
            debug!("Fetched details for {} (found: {})", asset_id, asset.is_some());
            FeedEvent::Asset { asset_id, asset }
        }
        Err(e) => {
            warn!("{}", e);
            FeedEvent::AssetFailed {
                asset_id,
                message: e.to_string(),
            }
        }
    };

    events.send(event).await.is_ok()
}
