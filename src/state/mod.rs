pub mod alerts;
pub mod filter;
pub mod indicators;
pub mod persist;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod watchlist;

pub use alerts::{AlertCondition, AlertNotification, AlertRegistry, AlertRule};
pub use filter::{visible_assets, FilterMode};
pub use indicators::SeriesSummary;
pub use persist::PersistedState;
pub use snapshot::MarketSnapshot;
pub use stats::MarketStats;
pub use store::{DashboardStore, Notice, NoticeLevel, SeriesView};
pub use watchlist::Watchlist;
