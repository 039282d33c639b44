use coinpulse::api::coingecko::CoinGeckoClient;
use coinpulse::api::feed::{self, FeedConfig};
use coinpulse::api::MarketDataSource;
use coinpulse::config;
use coinpulse::state::{persist, DashboardStore};
use coinpulse::ui::Dashboard;
use env_logger::{Builder, Target};
use log::{error, info, LevelFilter};
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

fn init_logger(log_file: &Path) {
    // The dashboard owns the terminal, so logs go to a file when possible
    let target = log_file
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_file))
        .map(|file| Target::Pipe(Box::new(file)))
        .unwrap_or(Target::Stderr);

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("coinpulse", LevelFilter::Debug)
        .filter_module("reqwest", LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(target)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let settings = config::load();
    init_logger(&settings.log_file);

    info!("Starting Coinpulse...");
    info!("State file: {}", settings.state_file.display());

    let store = DashboardStore::from_persisted(persist::load(&settings.state_file));
    let source: Arc<dyn MarketDataSource> =
        Arc::new(CoinGeckoClient::new(&settings.api_url, settings.cache_ttl)?);

    // Create channels
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(32);
    let (command_tx, command_rx) = tokio::sync::mpsc::channel(8);

    let feed_handle = tokio::spawn(feed::poll_markets(
        source,
        FeedConfig {
            snapshot_limit: settings.snapshot_limit,
            refresh_interval: settings.refresh_interval,
        },
        event_tx,
        command_rx,
    ));

    let dashboard = Dashboard::new(
        store,
        settings.state_file.clone(),
        settings.chart_days,
        command_tx,
    );

    let result = dashboard.run(event_rx).await;
    feed_handle.abort();

    if let Err(e) = &result {
        error!("Dashboard error: {}", e);
    }

    info!("Shutdown complete");
    result
}
