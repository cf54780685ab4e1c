//! Replay TUI - interactive terminal replay of an event's sales timeline
//!
//! Displays:
//! - Current bucket time, playback status and event progress
//! - One row per selling point with cumulative sales and marker radius
//! - The summary tree, with inconsistent selling points flagged
//!
//! Keys: space play/pause, ←/→ step, Home/End jump, q quit

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Row, Table},
    Frame, Terminal,
};
use sales_replay::domain::EventId;
use sales_replay::infra::{Config, Metrics};
use sales_replay::io::{ApiClient, EventSource, SnapshotSource};
use sales_replay::services::{create_playback_worker, PlaybackHandle, PlaybackSnapshot, PlaybackStatus, SummaryStore};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Width of the radius bar column
const BAR_WIDTH: usize = 24;

#[derive(Parser, Debug)]
#[command(name = "replay-tui", version, about = "Interactive sales timeline replay")]
struct Args {
    event_id: String,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long)]
    summary_file: Option<PathBuf>,

    #[arg(long)]
    timeline_file: Option<PathBuf>,
}

struct DashboardState {
    event_id: EventId,
    source: &'static str,
    snapshot: PlaybackSnapshot,
    summary_lines: Vec<String>,
    summary_total: Option<String>,
    warnings: usize,
    /// Largest radius seen so far, keeps bar lengths comparable across ticks
    max_radius: f64,
    last_error: Option<String>,
}

impl DashboardState {
    fn new(event_id: EventId, source: &'static str) -> Self {
        Self {
            event_id,
            source,
            snapshot: PlaybackSnapshot::default(),
            summary_lines: vec!["Loading...".to_string()],
            summary_total: None,
            warnings: 0,
            max_radius: 0.0,
            last_error: None,
        }
    }

    fn update_snapshot(&mut self, snapshot: PlaybackSnapshot) {
        for marker in &snapshot.markers {
            self.max_radius = self.max_radius.max(marker.radius);
        }
        self.snapshot = snapshot;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(&[]),
    };

    let source: Box<dyn EventSource> = if args.summary_file.is_some() || args.timeline_file.is_some() {
        Box::new(SnapshotSource::new(args.summary_file.clone(), args.timeline_file.clone()))
    } else {
        Box::new(ApiClient::new(&config)?)
    };

    let event_id = EventId::from(args.event_id.as_str());
    let metrics = Arc::new(Metrics::new());
    let mut state = DashboardState::new(event_id.clone(), source.name());

    match source.fetch_summary(&event_id).await {
        Ok(summary) => {
            let mut store = SummaryStore::with_metrics(config.integrity_policy(), metrics.clone());
            match store.replace(summary) {
                Ok(warnings) => {
                    state.warnings = warnings.len();
                    state.summary_lines = store.lines();
                    state.summary_total = store.summary().map(|s| s.total().to_string());
                }
                Err(e) => state.summary_lines = vec![e.to_string()],
            }
        }
        Err(e) => state.summary_lines = vec![format!("{:#}", e)],
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, worker) = create_playback_worker(
        config.marker_scale(),
        config.tick_interval(),
        metrics,
        config.command_buffer(),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    match source.fetch_timeline(&event_id).await {
        Ok(raw) => {
            if let Err(e) = handle.load(raw).await {
                state.last_error = Some(e.to_string());
            }
        }
        Err(e) => state.last_error = Some(format!("{:#}", e)),
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(&mut terminal, &handle, &mut state).await;

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    handle: &PlaybackHandle,
    state: &mut DashboardState,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame_rate = Duration::from_millis(100);

    loop {
        state.update_snapshot(handle.snapshot());
        terminal.draw(|f| draw_ui(f, state))?;

        if !event::poll(frame_rate)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let len = state.snapshot.len;
        let index = state.snapshot.index.unwrap_or(0);
        let result = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char(' ') => handle.toggle().await.map(|_| ()),
            KeyCode::Left => handle.seek(index.saturating_sub(1) as i64).await.map(|_| ()),
            KeyCode::Right => handle.seek((index + 1).min(len.saturating_sub(1)) as i64).await.map(|_| ()),
            KeyCode::Home => handle.seek(0).await.map(|_| ()),
            KeyCode::End => handle.seek(len.saturating_sub(1) as i64).await.map(|_| ()),
            _ => Ok(()),
        };
        state.last_error = result.err().map(|e| e.to_string());
    }
}

fn draw_ui(f: &mut Frame, state: &DashboardState) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Progress
            Constraint::Min(0),    // Panels
        ])
        .split(f.area());

    draw_header(f, main_chunks[0], state);
    draw_progress(f, main_chunks[1], state);

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60), // Markers
            Constraint::Percentage(40), // Summary
        ])
        .split(main_chunks[2]);

    draw_marker_panel(f, bottom_chunks[0], state);
    draw_summary_panel(f, bottom_chunks[1], state);
}

fn draw_header(f: &mut Frame, area: Rect, state: &DashboardState) {
    let snapshot = &state.snapshot;
    let (status_text, status_color) = match snapshot.status {
        PlaybackStatus::Idle => ("IDLE", Color::DarkGray),
        PlaybackStatus::Stopped => ("PAUSED", Color::Yellow),
        PlaybackStatus::Playing => ("PLAYING", Color::Green),
    };

    let position = match (snapshot.index, snapshot.bucket) {
        (Some(i), Some(bucket)) => {
            format!("{}/{} @ {}", i + 1, snapshot.len, bucket.format("%Y-%m-%d %H:%M"))
        }
        _ if snapshot.is_empty() => "no sales buckets".to_string(),
        _ => "-".to_string(),
    };

    let mut spans = vec![
        Span::styled("Sales Replay ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!("| {} ({}) | ", state.event_id, state.source)),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(format!(" | {} ", position)),
        Span::raw("| space ←/→ Home/End q"),
    ];
    if let Some(error) = &state.last_error {
        spans.push(Span::styled(format!(" | {}", error), Style::default().fg(Color::Red)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_progress(f: &mut Frame, area: Rect, state: &DashboardState) {
    let ratio = state.snapshot.progress.unwrap_or(0.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(Block::default().title(" Event time ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{:.0}%", ratio * 100.0));
    f.render_widget(gauge, area);
}

fn radius_bar(radius: f64, max_radius: f64) -> String {
    if max_radius <= 0.0 {
        return String::new();
    }
    let filled = ((radius / max_radius) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled.min(BAR_WIDTH))
}

fn draw_marker_panel(f: &mut Frame, area: Rect, state: &DashboardState) {
    let rows: Vec<Row> = state
        .snapshot
        .markers
        .iter()
        .map(|marker| {
            Row::new(vec![
                marker.selling_point_id.to_string(),
                marker.cumulative.to_string(),
                format!("{:.2}", marker.radius),
                radius_bar(marker.radius, state.max_radius),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),                    // Selling point
            Constraint::Length(12),                    // Cumulative
            Constraint::Length(8),                     // Radius
            Constraint::Length(BAR_WIDTH as u16 + 1), // Bar
        ],
    )
    .header(
        Row::new(vec!["Selling point", "Cumulative", "Radius", ""])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .title(" Markers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );

    f.render_widget(table, area);
}

fn draw_summary_panel(f: &mut Frame, area: Rect, state: &DashboardState) {
    let mut items: Vec<ListItem> = state
        .summary_lines
        .iter()
        .map(|line| {
            let style = if line.contains("[!]") {
                Style::default().fg(Color::Yellow)
            } else if line.starts_with("  ") {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(line.clone(), style)))
        })
        .collect();

    if let Some(total) = &state.summary_total {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("Total - {}", total),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ))));
    }

    let title = if state.warnings > 0 {
        format!(" Summary ({} inconsistent) ", state.warnings)
    } else {
        " Summary ".to_string()
    };
    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );

    f.render_widget(list, area);
}
