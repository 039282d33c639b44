use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::coingecko::COINGECKO_API_URL;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub refresh_interval: Duration,
    pub snapshot_limit: usize,
    pub chart_days: u32,
    pub cache_ttl: Duration,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();
    from_lookup(|key| env::var(key).ok())
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Settings {
    let positive = |key: &str, default: u64| {
        lookup(key)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(default)
    };

    let data_dir = dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("coinpulse");

    let api_url = lookup("COINPULSE_API_URL")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| COINGECKO_API_URL.to_string());

    let state_file = lookup("COINPULSE_STATE_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("state.json"));

    let log_file = lookup("COINPULSE_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("coinpulse.log"));

    Settings {
        api_url,
        refresh_interval: Duration::from_secs(positive("COINPULSE_REFRESH_SECS", 60)),
        snapshot_limit: positive("COINPULSE_SNAPSHOT_LIMIT", 50) as usize,
        chart_days: positive("COINPULSE_CHART_DAYS", 7) as u32,
        cache_ttl: Duration::from_secs(positive("COINPULSE_CACHE_SECS", 30)),
        state_file,
        log_file,
    }
}
