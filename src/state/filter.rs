use std::cmp::Ordering;

use crate::state::snapshot::MarketSnapshot;
use crate::state::watchlist::Watchlist;
use crate::models::Asset;

const MOVERS_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    All,
    Watchlist,
    Gainers,
    Losers,
}

impl FilterMode {
    pub const ALL: [FilterMode; 4] = [
        FilterMode::All,
        FilterMode::Watchlist,
        FilterMode::Gainers,
        FilterMode::Losers,
    ];

    pub fn next(self) -> Self {
        match self {
            FilterMode::All => FilterMode::Watchlist,
            FilterMode::Watchlist => FilterMode::Gainers,
            FilterMode::Gainers => FilterMode::Losers,
            FilterMode::Losers => FilterMode::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::All => "All",
            FilterMode::Watchlist => "Watchlist",
            FilterMode::Gainers => "Top Gainers",
            FilterMode::Losers => "Top Losers",
        }
    }
}

/// Assets to display for the given filter mode and search text, in display
/// order. The search is applied after the mode, so `Gainers`/`Losers` are
/// capped before being narrowed.
pub fn visible_assets<'a>(
    snapshot: &'a MarketSnapshot,
    watchlist: &Watchlist,
    mode: FilterMode,
    search: &str,
) -> Vec<&'a Asset> {
    let assets = snapshot.assets().iter();

    let mut filtered: Vec<&Asset> = match mode {
        FilterMode::All => assets.collect(),
        FilterMode::Watchlist => assets.filter(|a| watchlist.contains(&a.id)).collect(),
        FilterMode::Gainers => {
            let mut gainers: Vec<&Asset> = assets.filter(|a| a.change_24h() > 0.0).collect();
            gainers.sort_by(|a, b| by_change(b, a));
            gainers.truncate(MOVERS_LIMIT);
            gainers
        }
        FilterMode::Losers => {
            let mut losers: Vec<&Asset> = assets.filter(|a| a.change_24h() < 0.0).collect();
            losers.sort_by(|a, b| by_change(a, b));
            losers.truncate(MOVERS_LIMIT);
            losers
        }
    };

    if !search.trim().is_empty() {
        let needle = search.to_lowercase();
        filtered.retain(|a| a.matches(&needle));
    }

    filtered
}

fn by_change(a: &Asset, b: &Asset) -> Ordering {
    a.change_24h()
        .partial_cmp(&b.change_24h())
        .unwrap_or(Ordering::Equal)
}
