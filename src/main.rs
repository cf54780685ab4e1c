//! Sales replay - event sales summary and timeline replay
//!
//! Reads pre-aggregated summaries and bucketed cumulative timelines from the
//! sales backend (or from JSON snapshot files) and replays them headlessly.
//!
//! Module structure:
//! - `domain/` - Core types (Event, summary tree, Timeline, errors)
//! - `io/` - External interfaces (REST client, snapshot files)
//! - `services/` - Business logic (TimelineBuilder, Playback, SummaryStore)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::{Parser, Subcommand};
use sales_replay::domain::{EptCreateRequest, EptProvider, EventId, SellingPointId};
use sales_replay::infra::{Config, Metrics};
use sales_replay::io::{ApiClient, EventSource, SnapshotSource};
use sales_replay::services::{create_playback_worker, PlaybackSnapshot, SummaryStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Sales replay - summary and timeline replay for event sales
#[derive(Parser, Debug)]
#[command(name = "sales-replay", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Read the summary from a JSON snapshot instead of the backend
    #[arg(long, global = true)]
    summary_file: Option<PathBuf>,

    /// Read the timeline from a JSON snapshot instead of the backend
    #[arg(long, global = true)]
    timeline_file: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List events
    Events,
    /// Print the summary tree of an event
    Summary { event_id: String },
    /// Replay the sales timeline of an event
    Replay {
        event_id: String,
        /// Stop after this many ticks (default: one full loop)
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Create a payment terminal under a selling point
    AddEpt {
        event_id: String,
        selling_point_id: String,
        /// worldline, sumup or other
        #[arg(long)]
        provider: String,
        #[arg(long)]
        label: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!(git_hash = %env!("GIT_HASH"), "sales-replay starting");

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(&[]),
    };

    info!(
        config_file = %config.config_file(),
        api_base_url = %config.api_base_url(),
        tick_interval_ms = %config.tick_interval_ms(),
        marker_scale = %config.marker_scale().divisor(),
        integrity = %config.integrity_policy().as_str(),
        "config_loaded"
    );

    let source: Box<dyn EventSource> = if args.summary_file.is_some() || args.timeline_file.is_some() {
        Box::new(SnapshotSource::new(args.summary_file.clone(), args.timeline_file.clone()))
    } else {
        Box::new(ApiClient::new(&config)?)
    };
    info!(source = %source.name(), "source_selected");

    let metrics = Arc::new(Metrics::new());

    match args.command {
        Command::Events => list_events(source.as_ref()).await,
        Command::Summary { event_id } => {
            show_summary(source.as_ref(), &config, metrics, &EventId::from(event_id.as_str())).await
        }
        Command::Replay { event_id, ticks } => {
            replay(source.as_ref(), &config, metrics, &EventId::from(event_id.as_str()), ticks).await
        }
        Command::AddEpt { event_id, selling_point_id, provider, label } => {
            let provider: EptProvider = provider.parse()?;
            let request = EptCreateRequest::new(provider, &label)?;
            add_ept(
                source.as_ref(),
                &config,
                metrics,
                &EventId::from(event_id.as_str()),
                &SellingPointId::from(selling_point_id.as_str()),
                &request,
            )
            .await
        }
    }
}

/// Structured logging with configurable level via RUST_LOG env var
/// Default: INFO, use RUST_LOG=debug for per-tick visibility
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

async fn list_events(source: &dyn EventSource) -> anyhow::Result<()> {
    let events = source.list_events().await.context("Failed to list events")?;
    if events.is_empty() {
        println!("No events.");
    }
    for event in &events {
        println!(
            "{}  {}  {} -> {}",
            event.id,
            event.name,
            event.start_at.to_rfc3339(),
            event.end_at.to_rfc3339()
        );
    }
    info!(count = %events.len(), "events_listed");
    Ok(())
}

async fn load_summary(
    source: &dyn EventSource,
    config: &Config,
    metrics: Arc<Metrics>,
    event_id: &EventId,
) -> anyhow::Result<SummaryStore> {
    let summary = source
        .fetch_summary(event_id)
        .await
        .with_context(|| format!("Failed to fetch summary for event {}", event_id))?;

    let mut store = SummaryStore::with_metrics(config.integrity_policy(), metrics);
    store.replace(summary)?;
    Ok(store)
}

async fn show_summary(
    source: &dyn EventSource,
    config: &Config,
    metrics: Arc<Metrics>,
    event_id: &EventId,
) -> anyhow::Result<()> {
    let store = load_summary(source, config, metrics, event_id).await?;
    for line in store.lines() {
        println!("{}", line);
    }
    if let Some(summary) = store.summary() {
        println!("Total - {}", summary.total());
    }
    Ok(())
}

async fn add_ept(
    source: &dyn EventSource,
    config: &Config,
    metrics: Arc<Metrics>,
    event_id: &EventId,
    selling_point_id: &SellingPointId,
    request: &EptCreateRequest,
) -> anyhow::Result<()> {
    let mut store = load_summary(source, config, metrics.clone(), event_id).await?;
    let record = source
        .create_ept(selling_point_id, request)
        .await
        .with_context(|| format!("Failed to create terminal under {}", selling_point_id))?;

    if let Err(e) = store.apply_created_ept(record) {
        // Created remotely but absent from our copy; a re-fetch is authoritative
        warn!(error = %e, "ept_merge_failed_refetching");
        store = load_summary(source, config, metrics, event_id).await?;
    }

    for line in store.lines() {
        println!("{}", line);
    }
    Ok(())
}

async fn replay(
    source: &dyn EventSource,
    config: &Config,
    metrics: Arc<Metrics>,
    event_id: &EventId,
    ticks: Option<u64>,
) -> anyhow::Result<()> {
    let raw = source
        .fetch_timeline(event_id)
        .await
        .with_context(|| format!("Failed to fetch timeline for event {}", event_id))?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (handle, worker) = create_playback_worker(
        config.marker_scale(),
        config.tick_interval(),
        metrics.clone(),
        config.command_buffer(),
    );
    let worker_task = tokio::spawn(worker.run(shutdown_rx.clone()));

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    let mut reporter_shutdown = shutdown_rx;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => metrics_clone.report().log(),
                _ = reporter_shutdown.changed() => break,
            }
        }
    });

    handle.load(raw).await?;

    let first = handle.snapshot();
    print_frame(&first);

    if first.is_empty() {
        info!(event_id = %event_id, "timeline_empty_nothing_to_replay");
    } else {
        let limit = ticks.unwrap_or(first.len as u64);
        let (_, mut snapshots) = handle.play_and_subscribe().await?;
        info!(event_id = %event_id, buckets = %first.len, ticks = %limit, "replay_started");

        let mut seen = 0u64;
        while seen < limit {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    print_frame(&snapshot);
                    seen += 1;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown_signal_received");
                    break;
                }
            }
        }
        handle.pause().await?;
    }

    let _ = shutdown_tx.send(true);
    worker_task.await.context("Playback worker panicked")?;
    metrics.report().log();

    info!("sales-replay shutdown complete");
    Ok(())
}

fn print_frame(snapshot: &PlaybackSnapshot) {
    let (Some(index), Some(bucket)) = (snapshot.index, snapshot.bucket) else {
        println!("[{}] no buckets", snapshot.status.as_str());
        return;
    };
    let progress = snapshot.progress.map(|p| format!("{:5.1}%", p * 100.0)).unwrap_or_default();
    println!("[{}/{}] {} {}", index + 1, snapshot.len, bucket.format("%Y-%m-%d %H:%M"), progress);
    for marker in &snapshot.markers {
        println!(
            "  {:<16} {:>12} r={:.2}",
            marker.selling_point_id.to_string(),
            marker.cumulative,
            marker.radius
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_json_flag_is_global() {
        let args = Args::try_parse_from(["sales-replay", "replay", "fest", "--log-json"]).unwrap();
        assert!(args.log_json);
        assert!(matches!(args.command, Command::Replay { ticks: None, .. }));

        let args = Args::try_parse_from(["sales-replay", "events"]).unwrap();
        assert!(!args.log_json);
    }
}
