use log::{info, warn};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::state::alerts::{AlertCondition, AlertNotification, AlertRegistry};
use crate::state::filter::{visible_assets, FilterMode};
use crate::state::persist::PersistedState;
use crate::state::snapshot::MarketSnapshot;
use crate::state::stats::MarketStats;
use crate::state::watchlist::Watchlist;
use crate::error::Result;
use crate::models::{Asset, PricePoint};

pub const NOTICE_TTL: Duration = Duration::from_secs(5);
const MAX_NOTICES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
    pub raised_at: Instant,
}

#[derive(Debug, Clone)]
pub struct SeriesView {
    pub asset_id: String,
    pub days: u32,
    pub points: Vec<PricePoint>,
}

/// All dashboard state. The UI loop owns exactly one of these and mutates it
/// only through the methods below.
#[derive(Debug, Default)]
pub struct DashboardStore {
    snapshot: Option<MarketSnapshot>,
    watchlist: Watchlist,
    alerts: AlertRegistry,
    loading: bool,
    error: Option<String>,
    notices: VecDeque<Notice>,
    filter: FilterMode,
    search: String,
    selected: usize,
    series: Option<SeriesView>,
    detail: Option<Asset>,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(state: PersistedState) -> Self {
        Self {
            watchlist: state.watchlist,
            alerts: state.alerts,
            ..Self::default()
        }
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            watchlist: self.watchlist.clone(),
            alerts: self.alerts.clone(),
        }
    }

    pub fn begin_refresh(&mut self) {
        self.loading = true;
    }

    /// Replaces the snapshot and runs the alert evaluator over it. The
    /// returned notifications are also queued as notices.
    pub fn apply_snapshot(&mut self, assets: Vec<Asset>) -> Vec<AlertNotification> {
        let snapshot = MarketSnapshot::new(assets);
        let fired = self.alerts.evaluate(&snapshot);

        info!("Snapshot updated with {} assets", snapshot.len());
        self.snapshot = Some(snapshot);
        self.loading = false;
        self.error = None;

        for hit in &fired {
            info!("{}", hit);
            self.push_notice(hit.to_string(), NoticeLevel::Success);
        }

        self.clamp_selection();
        fired
    }

    /// The previous snapshot stays in place.
    pub fn record_fetch_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("Market refresh failed: {}", message);
        self.loading = false;
        self.error = Some(message.clone());
        self.push_notice(message, NoticeLevel::Error);
    }

    pub fn toggle_watchlist(&mut self, asset_id: &str) -> bool {
        let watched = self.watchlist.toggle(asset_id);
        info!(
            "{} {} watchlist",
            asset_id,
            if watched { "added to" } else { "removed from" }
        );
        self.clamp_selection();
        watched
    }

    pub fn create_alert(
        &mut self,
        asset_id: &str,
        asset_name: &str,
        threshold: f64,
        condition: AlertCondition,
    ) -> Result<Uuid> {
        let id = self
            .alerts
            .create(asset_id, asset_name, threshold, condition)?
            .id;
        self.push_notice(
            format!("Alert set: {} {} ${}", asset_name, condition, threshold),
            NoticeLevel::Info,
        );
        Ok(id)
    }

    pub fn remove_alert(&mut self, alert_id: Uuid) -> bool {
        self.alerts.remove(alert_id)
    }

    pub fn set_filter(&mut self, mode: FilterMode) {
        self.filter = mode;
        self.selected = 0;
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
        self.clamp_selection();
    }

    pub fn visible(&self) -> Vec<&Asset> {
        match &self.snapshot {
            Some(snapshot) => visible_assets(snapshot, &self.watchlist, self.filter, &self.search),
            None => Vec::new(),
        }
    }

    pub fn selected_asset(&self) -> Option<&Asset> {
        self.visible().get(self.selected).copied()
    }

    pub fn select_next(&mut self) {
        self.selected = self.selected.saturating_add(1);
        self.clamp_selection();
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn set_series(&mut self, asset_id: String, days: u32, points: Vec<PricePoint>) {
        self.series = Some(SeriesView {
            asset_id,
            days,
            points,
        });
    }

    /// Holds a coin fetched on its own, for when the snapshot no longer
    /// carries it.
    pub fn set_detail(&mut self, asset: Asset) {
        self.detail = Some(asset);
    }

    /// Looks the coin up in the snapshot first, then in the last detail fetch.
    pub fn chart_asset(&self, asset_id: &str) -> Option<&Asset> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.find(asset_id))
            .or_else(|| self.detail.as_ref().filter(|a| a.id == asset_id))
    }

    pub fn push_notice(&mut self, text: impl Into<String>, level: NoticeLevel) {
        self.notices.push_back(Notice {
            text: text.into(),
            level,
            raised_at: Instant::now(),
        });
        // alert notices live out their full TTL; only status chatter is evicted
        while self.notices.len() > MAX_NOTICES {
            let Some(oldest) = self
                .notices
                .iter()
                .position(|n| n.level != NoticeLevel::Success)
            else {
                break;
            };
            self.notices.remove(oldest);
        }
    }

    pub fn expire_notices(&mut self, now: Instant) {
        self.notices
            .retain(|n| now.saturating_duration_since(n.raised_at) < NOTICE_TTL);
    }

    pub fn stats(&self) -> MarketStats {
        self.snapshot
            .as_ref()
            .map(MarketStats::from_snapshot)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<&MarketSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn alerts(&self) -> &AlertRegistry {
        &self.alerts
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn series(&self) -> Option<&SeriesView> {
        self.series.as_ref()
    }
}
