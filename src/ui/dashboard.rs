use chrono::{Local, TimeZone};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info, warn};
use ratatui::layout::Alignment;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table},
    Frame, Terminal,
};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::api::feed::{FeedCommand, FeedEvent};
use crate::format::{format_market_cap, format_percentage, format_price, format_volume};
use crate::models::Asset;
use crate::state::persist;
use crate::state::{
    AlertCondition, DashboardStore, FilterMode, NoticeLevel, SeriesSummary, SeriesView,
};

type DynError = Box<dyn Error + Send + Sync>;
type Term = Terminal<CrosstermBackend<io::Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    Market,
    Alerts,
    Chart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertForm {
    pub asset_id: String,
    pub asset_name: String,
    pub current_price: f64,
    pub input: String,
    pub condition: AlertCondition,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    Search,
    NewAlert(AlertForm),
}

pub struct Dashboard {
    store: DashboardStore,
    view: DashboardView,
    input: InputMode,
    selected_alert: usize,
    running: bool,
    state_file: PathBuf,
    chart_days: u32,
    chart_asset: Option<String>,
    commands: mpsc::Sender<FeedCommand>,
}

impl Dashboard {
    pub fn new(
        store: DashboardStore,
        state_file: PathBuf,
        chart_days: u32,
        commands: mpsc::Sender<FeedCommand>,
    ) -> Self {
        Self {
            store,
            view: DashboardView::Market,
            input: InputMode::Normal,
            selected_alert: 0,
            running: true,
            state_file,
            chart_days,
            chart_asset: None,
            commands,
        }
    }

    pub fn store(&self) -> &DashboardStore {
        &self.store
    }

    pub fn view(&self) -> DashboardView {
        self.view
    }

    pub fn input(&self) -> &InputMode {
        &self.input
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn chart_days(&self) -> u32 {
        self.chart_days
    }

    /// Controls line plus one line per live notice.
    fn footer_height(&self) -> u16 {
        3 + self.store.notices().count() as u16
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<FeedEvent>) -> Result<(), DynError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal, &mut events);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        self.save_state();
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Term,
        events: &mut mpsc::Receiver<FeedEvent>,
    ) -> Result<(), DynError> {
        while self.running {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Release {
                        self.handle_key(key);
                    }
                }
            }

            while let Ok(event) = events.try_recv() {
                self.apply_event(event);
            }
            self.store.expire_notices(Instant::now());
            let footer_height = self.footer_height();

            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(4),
                        Constraint::Min(5),
                        Constraint::Length(footer_height),
                    ])
                    .split(f.size());

                self.render_header(f, chunks[0]);
                self.render_main_content(f, chunks[1]);
                self.render_footer(f, chunks[2]);
            })?;
        }
        Ok(())
    }

    pub fn apply_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Loading => self.store.begin_refresh(),
            FeedEvent::Snapshot(assets) => {
                let fired = self.store.apply_snapshot(assets);
                if !fired.is_empty() {
                    self.save_state();
                }
                self.refresh_missing_chart_asset();
            }
            FeedEvent::FetchFailed(message) => self.store.record_fetch_failure(message),
            FeedEvent::Series {
                asset_id,
                days,
                points,
            } => self.store.set_series(asset_id, days, points),
            FeedEvent::SeriesFailed { asset_id, message } => {
                warn!("Chart for {} unavailable: {}", asset_id, message);
                self.store.push_notice(message, NoticeLevel::Error);
            }
            FeedEvent::Asset {
                asset_id,
                asset: Some(asset),
            } => {
                info!("Refreshed {} outside the snapshot", asset_id);
                self.store.set_detail(asset);
            }
            FeedEvent::Asset {
                asset_id,
                asset: None,
            } => {
                warn!("{} is no longer listed", asset_id);
                self.store.push_notice(
                    format!("{} is no longer listed", asset_id),
                    NoticeLevel::Error,
                );
            }
            FeedEvent::AssetFailed { asset_id, message } => {
                warn!("Details for {} unavailable: {}", asset_id, message);
                self.store.push_notice(message, NoticeLevel::Error);
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match std::mem::replace(&mut self.input, InputMode::Normal) {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Search => self.handle_search_key(key),
            InputMode::NewAlert(form) => self.handle_alert_form_key(key, form),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Char('m') => self.view = DashboardView::Market,
            KeyCode::Char('a') => self.view = DashboardView::Alerts,
            KeyCode::Char('c') => self.open_chart(),
            KeyCode::Char('r') => self.send(FeedCommand::RefreshNow),
            KeyCode::Char('f') => self.store.set_filter(self.store.filter().next()),
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                self.store.set_filter(FilterMode::ALL[index]);
            }
            KeyCode::Char('/') => {
                self.view = DashboardView::Market;
                self.input = InputMode::Search;
            }
            KeyCode::Char('w') => {
                if let Some(id) = self.store.selected_asset().map(|a| a.id.clone()) {
                    self.store.toggle_watchlist(&id);
                    self.save_state();
                }
            }
            KeyCode::Char('n') => {
                if let Some(asset) = self.store.selected_asset() {
                    self.input = InputMode::NewAlert(AlertForm {
                        asset_id: asset.id.clone(),
                        asset_name: asset.name.clone(),
                        current_price: asset.price(),
                        input: String::new(),
                        condition: AlertCondition::Above,
                        error: None,
                    });
                }
            }
            KeyCode::Char('d') | KeyCode::Delete if self.view == DashboardView::Alerts => {
                let id = self.store.alerts().iter().nth(self.selected_alert).map(|r| r.id);
                if let Some(id) = id {
                    self.store.remove_alert(id);
                    self.selected_alert = self
                        .selected_alert
                        .min(self.store.alerts().len().saturating_sub(1));
                    self.save_state();
                }
            }
            KeyCode::Char('[') | KeyCode::Left if self.view == DashboardView::Chart => {
                self.step_chart_range(false)
            }
            KeyCode::Char(']') | KeyCode::Right if self.view == DashboardView::Chart => {
                self.step_chart_range(true)
            }
            KeyCode::Up => match self.view {
                DashboardView::Alerts => self.selected_alert = self.selected_alert.saturating_sub(1),
                DashboardView::Chart => {
                    self.store.select_prev();
                    self.open_chart();
                }
                DashboardView::Market => self.store.select_prev(),
            },
            KeyCode::Down => match self.view {
                DashboardView::Alerts => {
                    let last = self.store.alerts().len().saturating_sub(1);
                    self.selected_alert = (self.selected_alert + 1).min(last);
                }
                DashboardView::Chart => {
                    self.store.select_next();
                    self.open_chart();
                }
                DashboardView::Market => self.store.select_next(),
            },
            _ => (),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.store.set_search(""),
            KeyCode::Enter => (),
            KeyCode::Backspace => {
                let mut text = self.store.search().to_string();
                text.pop();
                self.store.set_search(text);
                self.input = InputMode::Search;
            }
            KeyCode::Char(c) => {
                let text = format!("{}{}", self.store.search(), c);
                self.store.set_search(text);
                self.input = InputMode::Search;
            }
            _ => self.input = InputMode::Search,
        }
    }

    fn handle_alert_form_key(&mut self, key: KeyEvent, mut form: AlertForm) {
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Tab => form.condition = form.condition.flip(),
            KeyCode::Backspace => {
                form.input.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => form.input.push(c),
            KeyCode::Enter => {
                let threshold = form.input.trim().parse::<f64>().unwrap_or(f64::NAN);
                match self.store.create_alert(
                    &form.asset_id,
                    &form.asset_name,
                    threshold,
                    form.condition,
                ) {
                    Ok(_) => {
                        self.save_state();
                        return;
                    }
                    Err(e) => form.error = Some(e.to_string()),
                }
            }
            _ => (),
        }
        self.input = InputMode::NewAlert(form);
    }

    fn open_chart(&mut self) {
        self.view = DashboardView::Chart;
        self.chart_asset = self.store.selected_asset().map(|a| a.id.clone());
        self.load_chart_series();
    }

    fn load_chart_series(&mut self) {
        if let Some(asset_id) = self.chart_asset.clone() {
            self.send(FeedCommand::LoadSeries {
                asset_id,
                days: self.chart_days,
            });
        }
    }

    fn step_chart_range(&mut self, forward: bool) {
        let days = next_chart_range(self.chart_days, forward);
        if days != self.chart_days {
            self.chart_days = days;
            self.load_chart_series();
        }
    }

    /// The charted coin can drop out of the top-N snapshot; fetch it on its
    /// own so the header keeps showing live numbers.
    fn refresh_missing_chart_asset(&mut self) {
        if self.view != DashboardView::Chart {
            return;
        }
        let Some(asset_id) = self.chart_asset.clone() else {
            return;
        };
        let listed = self
            .store
            .snapshot()
            .is_some_and(|s| s.find(&asset_id).is_some());
        if !listed {
            self.send(FeedCommand::LoadAsset { asset_id });
        }
    }

    fn send(&mut self, command: FeedCommand) {
        if let Err(e) = self.commands.try_send(command) {
            warn!("Market feed unavailable: {}", e);
            self.store
                .push_notice("Market feed unavailable", NoticeLevel::Error);
        }
    }

    fn save_state(&self) {
        match persist::save(&self.state_file, &self.store.persisted()) {
            Ok(()) => info!("Saved state to {}", self.state_file.display()),
            Err(e) => error!("Failed to save state: {}", e),
        }
    }

    fn render_header(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let stats = self.store.stats();

        let status = if self.store.is_loading() {
            Span::styled("LOADING", Style::default().fg(Color::Yellow))
        } else if self.store.error().is_some() {
            Span::styled("STALE", Style::default().fg(Color::Red))
        } else if self.store.snapshot().is_some() {
            Span::styled("LIVE", Style::default().fg(Color::Green))
        } else {
            Span::styled("WAITING", Style::default().fg(Color::Gray))
        };

        let last_update = self
            .store
            .snapshot()
            .map(|s| s.received_at().format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());

        let avg_color = if stats.avg_change_24h > 0.0 {
            Color::Green
        } else {
            Color::Red
        };

        let header = Paragraph::new(Text::from(vec![
            Line::from(vec![
                Span::styled(
                    "COINPULSE ",
                    Style::default()
                        .fg(Color::LightCyan)
                        .add_modifier(Modifier::BOLD),
                ),
                status,
                Span::styled(
                    format!("  Last update: {}", last_update),
                    Style::default().fg(Color::Gray),
                ),
            ]),
            Line::from(vec![
                Span::raw("Market Cap: "),
                Span::styled(
                    format_market_cap(stats.total_market_cap),
                    Style::default().fg(Color::LightBlue),
                ),
                Span::raw("  24h Volume: "),
                Span::styled(
                    format_volume(stats.total_volume),
                    Style::default().fg(Color::Magenta),
                ),
                Span::raw("  Avg Change: "),
                Span::styled(
                    format_percentage(stats.avg_change_24h),
                    Style::default().fg(avg_color),
                ),
                Span::raw("  Gainers/Losers: "),
                Span::styled(
                    format!("{} / {}", stats.gainers, stats.losers),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
            Line::from(Span::styled(
                self.store.error().unwrap_or_default().to_string(),
                Style::default().fg(Color::Red),
            )),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));

        f.render_widget(header, area);
    }

    fn render_main_content(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        match self.view {
            DashboardView::Market => self.render_market_view(f, area),
            DashboardView::Alerts => self.render_alerts_view(f, area),
            DashboardView::Chart => self.render_chart_view(f, area),
        }

        if let InputMode::NewAlert(form) = &self.input {
            self.render_alert_form(f, area, form);
        }
    }

    fn render_market_view(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let title = match (&self.input, self.store.search()) {
            (InputMode::Search, search) => {
                format!("Market: {} | Search: {}_", self.store.filter().as_str(), search)
            }
            (_, "") => format!("Market: {}", self.store.filter().as_str()),
            (_, search) => format!("Market: {} | Search: {}", self.store.filter().as_str(), search),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        let inner_area = block.inner(area);
        f.render_widget(block, area);

        if inner_area.height < 3 || inner_area.width < 30 {
            return;
        }

        let visible = self.store.visible();
        if visible.is_empty() {
            let message = match (self.store.snapshot(), self.store.filter()) {
                (None, _) => "Waiting for market data...",
                (Some(_), FilterMode::Watchlist) if self.store.search().is_empty() => {
                    "Your watchlist is empty. Press w on a coin to add it."
                }
                _ => "No coins match.",
            };
            f.render_widget(
                Paragraph::new(message).alignment(Alignment::Center),
                inner_area,
            );
            return;
        }

        // keep the selected row on screen
        let rows_fit = inner_area.height.saturating_sub(1) as usize;
        let selected = self.store.selected();
        let offset = selected.saturating_sub(rows_fit.saturating_sub(1));

        let rows = visible
            .iter()
            .enumerate()
            .skip(offset)
            .take(rows_fit)
            .map(|(i, asset)| self.market_row(asset, i == selected));

        let table = Table::new(rows)
            .header(
                Row::new(vec!["", "#", "Coin", "Price", "24h", "7d", "Market Cap", "Volume"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .widths(&[
                Constraint::Length(2),
                Constraint::Length(4),
                Constraint::Length(22),
                Constraint::Length(16),
                Constraint::Length(9),
                Constraint::Length(9),
                Constraint::Length(11),
                Constraint::Length(11),
            ]);

        f.render_widget(table, inner_area);
    }

    fn market_row(&self, asset: &Asset, is_selected: bool) -> Row<'static> {
        let watched = if self.store.watchlist().contains(&asset.id) {
            "★"
        } else {
            " "
        };
        let change_7d = asset
            .change_7d()
            .map(format_percentage)
            .unwrap_or_else(|| "-".to_string());

        Row::new(vec![
            Cell::from(Span::styled(watched, Style::default().fg(Color::Yellow))),
            Cell::from(
                asset
                    .market_cap_rank
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
            ),
            Cell::from(format!("{} ({})", asset.name, asset.symbol.to_uppercase())),
            Cell::from(format_price(asset.price())),
            Cell::from(Span::styled(
                format_percentage(asset.change_24h()),
                Style::default().fg(change_color(asset.change_24h())),
            )),
            Cell::from(Span::styled(
                change_7d,
                Style::default().fg(change_color(asset.change_7d().unwrap_or(0.0))),
            )),
            Cell::from(format_market_cap(asset.market_cap())),
            Cell::from(format_volume(asset.volume())),
        ])
        .style(if is_selected {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        })
    }

    fn render_alerts_view(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let alerts = self.store.alerts();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Alerts ({} pending)", alerts.pending().count()));

        let inner_area = block.inner(area);
        f.render_widget(block, area);

        if inner_area.height < 3 || inner_area.width < 30 {
            return;
        }

        if alerts.is_empty() {
            f.render_widget(
                Paragraph::new("No alerts yet. Select a coin and press n.")
                    .alignment(Alignment::Center),
                inner_area,
            );
            return;
        }

        let rows = alerts.iter().enumerate().map(|(i, alert)| {
            let current = self
                .store
                .snapshot()
                .and_then(|s| s.find(&alert.asset_id))
                .map(|a| format_price(a.price()))
                .unwrap_or_else(|| "-".to_string());

            let status = if alert.triggered {
                Span::styled("TRIGGERED", Style::default().fg(Color::Green))
            } else {
                Span::styled("PENDING", Style::default().fg(Color::Yellow))
            };

            let created = Local
                .timestamp_millis_opt(alert.created_at)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();

            Row::new(vec![
                Cell::from(alert.asset_name.clone()),
                Cell::from(format!("{} {}", alert.condition, format_price(alert.threshold))),
                Cell::from(current),
                Cell::from(status),
                Cell::from(created),
            ])
            .style(if i == self.selected_alert {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            })
        });

        let table = Table::new(rows)
            .header(
                Row::new(vec!["Coin", "Condition", "Current", "Status", "Created"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .widths(&[
                Constraint::Length(18),
                Constraint::Length(22),
                Constraint::Length(16),
                Constraint::Length(11),
                Constraint::Length(17),
            ]);

        f.render_widget(table, inner_area);
    }

    fn render_chart_view(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let asset = self
            .chart_asset
            .as_deref()
            .and_then(|id| self.store.chart_asset(id));
        let Some(asset) = asset else {
            let message = Paragraph::new("No coin selected")
                .block(Block::default().borders(Borders::ALL).title("Chart"));
            f.render_widget(message, area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(5)])
            .split(area);

        let series = self
            .store
            .series()
            .filter(|s| s.asset_id == asset.id);

        let prices: Vec<f64> = match series {
            Some(SeriesView { points, .. }) => points.iter().map(|p| p.price).collect(),
            None => asset.sparkline().to_vec(),
        };

        let mut info = vec![
            Span::raw("Current: "),
            Span::styled(format_price(asset.price()), Style::default().fg(Color::Yellow)),
            Span::raw(" ("),
            Span::styled(
                format_percentage(asset.change_24h()),
                Style::default().fg(change_color(asset.change_24h())),
            ),
            Span::raw(" 24h)"),
        ];

        let mut details = vec![
            Span::raw(format!(
                "Rank: {}",
                asset
                    .market_cap_rank
                    .map(|r| format!("#{r}"))
                    .unwrap_or_else(|| "-".to_string())
            )),
            Span::raw(format!("  Market Cap: {}", format_market_cap(asset.market_cap()))),
            Span::raw(format!("  Volume: {}", format_volume(asset.volume()))),
        ];
        if let Some((low, high)) = asset.range_24h() {
            details.push(Span::raw("  24h Low/High: "));
            details.push(Span::styled(format_price(low), Style::default().fg(Color::Red)));
            details.push(Span::raw(" / "));
            details.push(Span::styled(format_price(high), Style::default().fg(Color::Green)));
        }

        if let Some(summary) = series.and_then(|s| SeriesSummary::from_points(&s.points)) {
            info.push(Span::raw(format!(
                "  {}: {}  Low {}  High {}",
                range_label(series.map_or(self.chart_days, |s| s.days)),
                format_percentage(summary.change_pct()),
                format_price(summary.min),
                format_price(summary.max)
            )));
            if let Some(sma) = summary.sma_20 {
                info.push(Span::raw(format!("  SMA20 {}", format_price(sma))));
            }
            if let Some(rsi) = summary.rsi_14 {
                info.push(Span::raw(format!("  RSI14 {:.1}", rsi)));
            }
        } else if series.is_none() {
            info.push(Span::styled(
                "  (loading history, showing 7d sparkline)",
                Style::default().fg(Color::DarkGray),
            ));
        }

        let mut title = vec![Span::styled(
            format!("{} ({}) Price Chart  ", asset.name, asset.symbol.to_uppercase()),
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        )];
        for (days, label) in CHART_RANGES {
            let style = if days == self.chart_days {
                Style::default().fg(Color::Black).bg(Color::LightCyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            title.push(Span::styled(format!(" {label} "), style));
        }

        let header = Paragraph::new(Text::from(vec![
            Line::from(title),
            Line::from(info),
            Line::from(details),
        ]));
        f.render_widget(header, chunks[0]);

        self.render_price_sparkline(f, chunks[1], &asset.name, &prices);
    }

    fn render_price_sparkline(
        &self,
        f: &mut Frame<CrosstermBackend<io::Stdout>>,
        area: Rect,
        name: &str,
        prices: &[f64],
    ) {
        let chart_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray))
            .title(format!("{} Price History", name))
            .title_alignment(Alignment::Center);

        if prices.len() < 2 {
            let message = Paragraph::new("Insufficient data for chart").block(chart_block);
            f.render_widget(message, area);
            return;
        }

        let inner_area = chart_block.inner(area);
        if inner_area.height < 3 || inner_area.width < 10 {
            return;
        }
        f.render_widget(chart_block, area);

        let data = sparkline_levels(prices, inner_area.width as usize);
        let rising = prices.last() >= prices.first();
        let sparkline = Sparkline::default()
            .data(&data)
            .max(SPARKLINE_MAX)
            .style(Style::default().fg(if rising { Color::Green } else { Color::Red }))
            .bar_set(ratatui::symbols::bar::NINE_LEVELS);
        f.render_widget(sparkline, inner_area);

        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let top_label =
            Paragraph::new(format_price(max_price)).style(Style::default().fg(Color::Gray));
        let bottom_label =
            Paragraph::new(format_price(min_price)).style(Style::default().fg(Color::Gray));

        let label_width = 16.min(inner_area.width);
        f.render_widget(
            top_label,
            Rect::new(inner_area.right() - label_width, inner_area.y, label_width, 1),
        );
        f.render_widget(
            bottom_label,
            Rect::new(
                inner_area.right() - label_width,
                inner_area.bottom() - 1,
                label_width,
                1,
            ),
        );
    }

    fn render_alert_form(
        &self,
        f: &mut Frame<CrosstermBackend<io::Stdout>>,
        area: Rect,
        form: &AlertForm,
    ) {
        let width = 56.min(area.width);
        let height = 7.min(area.height);
        let popup = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );

        let mut lines = vec![
            Line::from(vec![
                Span::raw("Current price: "),
                Span::styled(
                    format_price(form.current_price),
                    Style::default().fg(Color::Yellow),
                ),
            ]),
            Line::from(vec![
                Span::raw("Notify when price is "),
                Span::styled(
                    form.condition.as_str(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" $"),
                Span::styled(
                    format!("{}_", form.input),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]),
        ];
        if let Some(err) = &form.error {
            lines.push(Line::from(Span::styled(
                err.as_str(),
                Style::default().fg(Color::Red),
            )));
        }

        let widget = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("New alert: {}", form.asset_name)),
        );

        f.render_widget(ratatui::widgets::Clear, popup);
        f.render_widget(widget, popup);
    }

    fn render_footer(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let key = |k: &'static str| Span::styled(k, Style::default().add_modifier(Modifier::BOLD));

        let controls = match (&self.input, self.view) {
            (InputMode::Search, _) => vec![
                Span::raw("Type to search  "),
                key("Enter"),
                Span::raw(" Keep  "),
                key("Esc"),
                Span::raw(" Clear"),
            ],
            (InputMode::NewAlert(_), _) => vec![
                Span::raw("Type a price  "),
                key("Tab"),
                Span::raw(" Above/Below  "),
                key("Enter"),
                Span::raw(" Create  "),
                key("Esc"),
                Span::raw(" Cancel"),
            ],
            (InputMode::Normal, DashboardView::Alerts) => vec![
                Span::raw("Controls: "),
                key("↑/↓"),
                Span::raw(" Navigate  "),
                key("d"),
                Span::raw(" Delete  "),
                key("m"),
                Span::raw(" Market  "),
                key("q"),
                Span::raw(" Quit"),
            ],
            (InputMode::Normal, DashboardView::Chart) => vec![
                Span::raw("Controls: "),
                key("[/]"),
                Span::raw(" Range  "),
                key("↑/↓"),
                Span::raw(" Coin  "),
                key("m"),
                Span::raw(" Market  "),
                key("a"),
                Span::raw(" Alerts  "),
                key("r"),
                Span::raw(" Refresh  "),
                key("q"),
                Span::raw(" Quit"),
            ],
            (InputMode::Normal, DashboardView::Market) => vec![
                Span::raw("Controls: "),
                key("↑/↓"),
                Span::raw(" Navigate  "),
                key("f/1-4"),
                Span::raw(" Filter  "),
                key("/"),
                Span::raw(" Search  "),
                key("w"),
                Span::raw(" Watch  "),
                key("n"),
                Span::raw(" Alert  "),
                key("a"),
                Span::raw(" Alerts  "),
                key("c"),
                Span::raw(" Chart  "),
                key("m"),
                Span::raw(" Market  "),
                key("r"),
                Span::raw(" Refresh  "),
                key("q"),
                Span::raw(" Quit"),
            ],
        };

        let mut lines = vec![Line::from(controls)];
        lines.extend(self.store.notices().map(|notice| {
            let color = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(notice.text.clone(), Style::default().fg(color)))
        }));

        let footer = Paragraph::new(Text::from(lines))
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));

        f.render_widget(footer, area);
    }
}

const SPARKLINE_MAX: u64 = 100;

/// Selectable chart windows, in days.
const CHART_RANGES: [(u32, &str); 5] = [(1, "24H"), (7, "7D"), (30, "30D"), (90, "90D"), (365, "1Y")];

/// Next wider (or narrower) window than `days`; stays put at either end.
fn next_chart_range(days: u32, forward: bool) -> u32 {
    let next = if forward {
        CHART_RANGES.iter().map(|(d, _)| *d).find(|d| *d > days)
    } else {
        CHART_RANGES.iter().rev().map(|(d, _)| *d).find(|d| *d < days)
    };
    next.unwrap_or(days)
}

fn range_label(days: u32) -> String {
    CHART_RANGES
        .iter()
        .find(|(d, _)| *d == days)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| format!("{days}D"))
}

fn change_color(change: f64) -> Color {
    if change > 0.0 {
        Color::Green
    } else if change < 0.0 {
        Color::Red
    } else {
        Color::Gray
    }
}

/// Resamples `prices` to at most `width` bars scaled into `1..=SPARKLINE_MAX`.
fn sparkline_levels(prices: &[f64], width: usize) -> Vec<u64> {
    if prices.is_empty() || width == 0 {
        return Vec::new();
    }

    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let step = (prices.len() as f64 / width as f64).ceil().max(1.0) as usize;

    prices
        .iter()
        .step_by(step)
        .map(|p| {
            if range <= 0.0 {
                SPARKLINE_MAX / 2
            } else {
                1 + ((p - min) / range * (SPARKLINE_MAX - 1) as f64).round() as u64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sparkline as SparklineData;
    use uuid::Uuid;

    fn asset(id: &str, name: &str, symbol: &str, price: f64, change: f64) -> Asset {
        let mut asset = Asset::sample(id, name, symbol, price, change);
        asset.sparkline_in_7d = Some(SparklineData {
            price: vec![price * 0.9, price],
        });
        asset
    }

    /// Removes the dashboard's state directory when dropped.
    struct StateDir(PathBuf);

    impl Drop for StateDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn market() -> Vec<Asset> {
        vec![
            asset("bitcoin", "Bitcoin", "btc", 64_000.0, 2.0),
            asset("ethereum", "Ethereum", "eth", 3_100.0, -1.0),
        ]
    }

    fn dashboard() -> (Dashboard, mpsc::Receiver<FeedCommand>, StateDir) {
        let (tx, rx) = mpsc::channel(8);
        let dir = std::env::temp_dir().join(format!("coinpulse-ui-{}", Uuid::new_v4()));
        let mut dashboard = Dashboard::new(DashboardStore::new(), dir.join("state.json"), 7, tx);
        dashboard.apply_event(FeedEvent::Snapshot(market()));
        (dashboard, rx, StateDir(dir))
    }

    fn series_request(asset_id: &str, days: u32) -> FeedCommand {
        FeedCommand::LoadSeries {
            asset_id: asset_id.to_string(),
            days,
        }
    }

    fn press(dashboard: &mut Dashboard, code: KeyCode) {
        dashboard.handle_key(KeyEvent::from(code));
    }

    fn type_text(dashboard: &mut Dashboard, text: &str) {
        for c in text.chars() {
            press(dashboard, KeyCode::Char(c));
        }
    }

    #[test]
    fn w_toggles_selected_coin() {
        let (mut dashboard, _rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Down);
        press(&mut dashboard, KeyCode::Char('w'));
        assert!(dashboard.store().watchlist().contains("ethereum"));

        press(&mut dashboard, KeyCode::Char('4'));
        assert_eq!(dashboard.store().filter(), FilterMode::Losers);
        press(&mut dashboard, KeyCode::Char('w'));
        assert!(dashboard.store().watchlist().is_empty());
    }

    #[test]
    fn search_mode_edits_and_clears() {
        let (mut dashboard, _rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('/'));
        type_text(&mut dashboard, "ethx");
        press(&mut dashboard, KeyCode::Backspace);
        assert_eq!(dashboard.store().search(), "eth");
        assert_eq!(dashboard.store().visible().len(), 1);

        // q is search text here, not quit
        type_text(&mut dashboard, "q");
        assert!(dashboard.is_running());

        press(&mut dashboard, KeyCode::Esc);
        assert_eq!(dashboard.input(), &InputMode::Normal);
        assert_eq!(dashboard.store().search(), "");
    }

    #[test]
    fn alert_form_rejects_bad_threshold_and_stays_open() {
        let (mut dashboard, _rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('n'));
        press(&mut dashboard, KeyCode::Enter);

        match dashboard.input() {
            InputMode::NewAlert(form) => {
                assert_eq!(form.asset_id, "bitcoin");
                assert!(form.error.is_some());
            }
            other => panic!("form closed: {other:?}"),
        }
        assert!(dashboard.store().alerts().is_empty());

        type_text(&mut dashboard, "0");
        press(&mut dashboard, KeyCode::Enter);
        assert!(matches!(dashboard.input(), InputMode::NewAlert(_)));
        assert!(dashboard.store().alerts().is_empty());
    }

    #[test]
    fn alert_form_creates_rule() {
        let (mut dashboard, _rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('n'));
        type_text(&mut dashboard, "60000.5");
        press(&mut dashboard, KeyCode::Tab);
        press(&mut dashboard, KeyCode::Enter);

        assert_eq!(dashboard.input(), &InputMode::Normal);
        let rule = dashboard.store().alerts().iter().next().unwrap();
        assert_eq!(rule.threshold, 60_000.5);
        assert_eq!(rule.condition, AlertCondition::Below);
        assert_eq!(rule.asset_name, "Bitcoin");
    }

    #[test]
    fn delete_removes_selected_alert() {
        let (mut dashboard, _rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('n'));
        type_text(&mut dashboard, "1");
        press(&mut dashboard, KeyCode::Enter);

        // d outside the alerts view does nothing
        press(&mut dashboard, KeyCode::Char('d'));
        assert_eq!(dashboard.store().alerts().len(), 1);

        press(&mut dashboard, KeyCode::Char('a'));
        press(&mut dashboard, KeyCode::Char('d'));
        assert!(dashboard.store().alerts().is_empty());
    }

    #[test]
    fn chart_reloads_series_on_every_open() {
        let (mut dashboard, mut rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('c'));
        assert_eq!(dashboard.view(), DashboardView::Chart);
        assert_eq!(rx.try_recv().unwrap(), series_request("bitcoin", 7));

        dashboard.apply_event(FeedEvent::Series {
            asset_id: "bitcoin".to_string(),
            days: 7,
            points: Vec::new(),
        });
        press(&mut dashboard, KeyCode::Char('m'));
        press(&mut dashboard, KeyCode::Char('c'));
        assert_eq!(rx.try_recv().unwrap(), series_request("bitcoin", 7));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn chart_range_keys_request_new_window() {
        let (mut dashboard, mut rx, _dir) = dashboard();

        // range keys mean nothing outside the chart
        press(&mut dashboard, KeyCode::Char(']'));
        assert!(rx.try_recv().is_err());
        assert_eq!(dashboard.chart_days(), 7);

        press(&mut dashboard, KeyCode::Char('c'));
        assert_eq!(rx.try_recv().unwrap(), series_request("bitcoin", 7));

        press(&mut dashboard, KeyCode::Char(']'));
        assert_eq!(rx.try_recv().unwrap(), series_request("bitcoin", 30));
        press(&mut dashboard, KeyCode::Right);
        press(&mut dashboard, KeyCode::Char(']'));
        assert_eq!(rx.try_recv().unwrap(), series_request("bitcoin", 90));
        assert_eq!(rx.try_recv().unwrap(), series_request("bitcoin", 365));

        // already at 1Y
        press(&mut dashboard, KeyCode::Char(']'));
        assert!(rx.try_recv().is_err());

        for _ in 0..5 {
            press(&mut dashboard, KeyCode::Char('['));
        }
        let requested: Vec<FeedCommand> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            requested,
            vec![
                series_request("bitcoin", 90),
                series_request("bitcoin", 30),
                series_request("bitcoin", 7),
                series_request("bitcoin", 1),
            ]
        );
        assert_eq!(dashboard.chart_days(), 1);

        // the chosen window sticks for the next coin
        press(&mut dashboard, KeyCode::Down);
        assert_eq!(rx.try_recv().unwrap(), series_request("ethereum", 1));
    }

    #[test]
    fn chart_ranges_step_from_any_configured_window() {
        assert_eq!(next_chart_range(14, true), 30);
        assert_eq!(next_chart_range(14, false), 7);
        assert_eq!(next_chart_range(1, false), 1);
        assert_eq!(next_chart_range(365, true), 365);
        assert_eq!(range_label(1), "24H");
        assert_eq!(range_label(14), "14D");
    }

    #[test]
    fn charted_coin_missing_from_snapshot_is_fetched_alone() {
        let (mut dashboard, mut rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Down);
        press(&mut dashboard, KeyCode::Char('c'));
        assert_eq!(rx.try_recv().unwrap(), series_request("ethereum", 7));

        // still listed: nothing extra to fetch
        dashboard.apply_event(FeedEvent::Snapshot(market()));
        assert!(rx.try_recv().is_err());

        let bitcoin_only = vec![asset("bitcoin", "Bitcoin", "btc", 64_500.0, 2.5)];
        dashboard.apply_event(FeedEvent::Snapshot(bitcoin_only.clone()));
        assert_eq!(
            rx.try_recv().unwrap(),
            FeedCommand::LoadAsset {
                asset_id: "ethereum".to_string()
            }
        );

        let mut ethereum = asset("ethereum", "Ethereum", "eth", 2_950.0, -4.0);
        ethereum.high_24h = Some(3_120.0);
        ethereum.low_24h = Some(2_900.0);
        dashboard.apply_event(FeedEvent::Asset {
            asset_id: "ethereum".to_string(),
            asset: Some(ethereum),
        });
        let charted = dashboard.store().chart_asset("ethereum").unwrap();
        assert_eq!(charted.price(), 2_950.0);
        assert_eq!(charted.range_24h(), Some((2_900.0, 3_120.0)));

        // away from the chart, a missing coin is not chased
        press(&mut dashboard, KeyCode::Char('m'));
        dashboard.apply_event(FeedEvent::Snapshot(bitcoin_only));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn delisted_chart_coin_raises_notice() {
        let (mut dashboard, _rx, _dir) = dashboard();
        dashboard.apply_event(FeedEvent::Asset {
            asset_id: "terra-luna".to_string(),
            asset: None,
        });
        let notice = dashboard.store().notices().last().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("terra-luna"));
    }

    #[test]
    fn footer_grows_with_every_live_notice() {
        let (mut dashboard, _rx, _dir) = dashboard();
        assert_eq!(dashboard.footer_height(), 3);

        for threshold in 1..=7 {
            dashboard
                .store
                .create_alert("bitcoin", "Bitcoin", threshold as f64, AlertCondition::Above)
                .unwrap();
        }
        dashboard.apply_event(FeedEvent::Snapshot(market()));

        let alerts = dashboard
            .store()
            .notices()
            .filter(|n| n.level == NoticeLevel::Success)
            .count();
        assert_eq!(alerts, 7);
        assert_eq!(
            dashboard.footer_height(),
            3 + dashboard.store().notices().count() as u16
        );
    }

    #[test]
    fn state_dir_is_removed_after_test() {
        let (mut dashboard, _rx, dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('w'));
        let state_dir = dir.0.clone();
        assert!(state_dir.join("state.json").exists());

        drop(dir);
        assert!(!state_dir.exists());
    }

    #[test]
    fn refresh_and_quit() {
        let (mut dashboard, mut rx, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('r'));
        assert_eq!(rx.try_recv().unwrap(), FeedCommand::RefreshNow);

        press(&mut dashboard, KeyCode::Char('q'));
        assert!(!dashboard.is_running());
    }

    #[test]
    fn sparkline_levels_fit_width() {
        let prices: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let levels = sparkline_levels(&prices, 20);
        assert!(levels.len() <= 20);
        assert_eq!(levels[0], 1);
        assert!(levels.iter().all(|l| (1..=SPARKLINE_MAX).contains(l)));

        assert_eq!(sparkline_levels(&[5.0, 5.0], 10), vec![50, 50]);
    }
}
