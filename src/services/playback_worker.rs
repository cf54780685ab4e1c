//! Playback worker - owns the controller and drives it from a timer
//!
//! Commands arrive on an mpsc channel through a cloneable `PlaybackHandle`
//! and snapshots leave on a watch channel, so renderers never touch the
//! controller directly. The timer is armed only while playing and is
//! re-created whenever the controller opens a new epoch, which makes a
//! pause/play or reload cancel any tick that was already scheduled.

use crate::domain::error::PlaybackError;
use crate::domain::timeline::RawTimeline;
use crate::infra::metrics::Metrics;
use crate::services::marker::MarkerScale;
use crate::services::playback::{PlaybackController, PlaybackSnapshot, TickOutcome};
use crate::services::timeline_builder::TimelineBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A playback command with its reply channel
#[derive(Debug)]
pub enum PlaybackCmd {
    Load { raw: RawTimeline, reply: oneshot::Sender<Result<u64, PlaybackError>> },
    Play { reply: oneshot::Sender<bool> },
    Pause { reply: oneshot::Sender<bool> },
    Toggle { reply: oneshot::Sender<bool> },
    Seek { index: i64, reply: oneshot::Sender<Result<usize, PlaybackError>> },
}

/// Cloneable front end for the worker
#[derive(Clone)]
pub struct PlaybackHandle {
    cmd_tx: mpsc::Sender<PlaybackCmd>,
    snapshot_rx: watch::Receiver<PlaybackSnapshot>,
}

impl PlaybackHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> PlaybackCmd,
    ) -> Result<T, PlaybackError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx.send(make(reply_tx)).await.map_err(|_| PlaybackError::WorkerStopped)?;
        reply_rx.await.map_err(|_| PlaybackError::WorkerStopped)
    }

    /// Validate and load a timeline; on error the current one stays active
    pub async fn load(&self, raw: RawTimeline) -> Result<u64, PlaybackError> {
        self.request(|reply| PlaybackCmd::Load { raw, reply }).await?
    }

    pub async fn play(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlaybackCmd::Play { reply }).await
    }

    pub async fn pause(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlaybackCmd::Pause { reply }).await
    }

    pub async fn toggle(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlaybackCmd::Toggle { reply }).await
    }

    pub async fn seek(&self, index: i64) -> Result<usize, PlaybackError> {
        self.request(|reply| PlaybackCmd::Seek { index, reply }).await?
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Start playing and return a receiver that has already seen the
    /// post-play snapshot, so each later change is a tick or a command
    pub async fn play_and_subscribe(
        &self,
    ) -> Result<(bool, watch::Receiver<PlaybackSnapshot>), PlaybackError> {
        let mut rx = self.snapshot_rx.clone();
        let started = self.play().await?;
        rx.borrow_and_update();
        Ok((started, rx))
    }
}

pub struct PlaybackWorker {
    controller: PlaybackController,
    builder: TimelineBuilder,
    cmd_rx: mpsc::Receiver<PlaybackCmd>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    period: Duration,
    /// Armed interval and the epoch it belongs to
    timer: Option<(Interval, u64)>,
}

impl PlaybackWorker {
    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(period_ms = %self.period.as_millis(), "playback_worker_started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("playback_worker_shutdown");
                        break;
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
                epoch = next_tick(&mut self.timer) => {
                    self.on_tick(epoch);
                }
            }
        }

        self.timer = None;
        info!("playback_worker_stopped");
    }

    /// Apply a command, then publish before replying so callers observe
    /// the new snapshot as soon as their request resolves
    fn handle(&mut self, cmd: PlaybackCmd) {
        match cmd {
            PlaybackCmd::Load { raw, reply } => {
                let result = self.controller.try_load(raw, &self.builder).map_err(PlaybackError::from);
                self.settle();
                let _ = reply.send(result);
            }
            PlaybackCmd::Play { reply } => {
                let changed = self.controller.play();
                self.settle();
                let _ = reply.send(changed);
            }
            PlaybackCmd::Pause { reply } => {
                let changed = self.controller.pause();
                self.settle();
                let _ = reply.send(changed);
            }
            PlaybackCmd::Toggle { reply } => {
                let playing = self.controller.toggle();
                self.settle();
                let _ = reply.send(playing);
            }
            PlaybackCmd::Seek { index, reply } => {
                let result = self.controller.seek(index);
                self.settle();
                let _ = reply.send(result);
            }
        }
    }

    fn settle(&mut self) {
        self.rearm();
        self.publish();
    }

    fn on_tick(&mut self, epoch: u64) {
        match self.controller.tick_for(epoch) {
            TickOutcome::Advanced(index) => {
                debug!(index = %index, epoch = %epoch, "playback_tick");
                self.publish();
            }
            TickOutcome::Stale | TickOutcome::NotPlaying => {
                self.rearm();
            }
        }
    }

    /// Keep the timer in step with the controller's epoch
    fn rearm(&mut self) {
        if !self.controller.is_playing() {
            self.timer = None;
            return;
        }
        let epoch = self.controller.epoch();
        if matches!(&self.timer, Some((_, armed)) if *armed == epoch) {
            return;
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.timer = Some((interval, epoch));
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.controller.snapshot());
    }
}

async fn next_tick(timer: &mut Option<(Interval, u64)>) -> u64 {
    match timer {
        Some((interval, epoch)) => {
            interval.tick().await;
            *epoch
        }
        None => std::future::pending().await,
    }
}

/// Create the playback channels and worker
///
/// Returns the handle (for callers) and the worker (to be spawned)
pub fn create_playback_worker(
    scale: MarkerScale,
    period: Duration,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (PlaybackHandle, PlaybackWorker) {
    if period.is_zero() {
        warn!("playback_period_zero_clamped");
    }
    let period = period.max(Duration::from_millis(1));

    let controller = PlaybackController::with_metrics(scale, metrics.clone());
    let (cmd_tx, cmd_rx) = mpsc::channel(buffer_size.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

    let worker = PlaybackWorker {
        controller,
        builder: TimelineBuilder::with_metrics(metrics),
        cmd_rx,
        snapshot_tx,
        period,
        timer: None,
    };
    (PlaybackHandle { cmd_tx, snapshot_rx }, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeline::{EventBounds, RawSeries};
    use crate::domain::types::SellingPointId;
    use crate::services::playback::PlaybackStatus;
    use chrono::{DateTime, TimeZone, Utc};
    use tokio::time::sleep;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap() + chrono::Duration::minutes(minute)
    }

    fn raw(cumulative: Vec<i64>) -> RawTimeline {
        RawTimeline {
            event: EventBounds { start_at: at(0), end_at: at(60) },
            buckets: (0..cumulative.len() as i64).map(|i| at(i * 10)).collect(),
            series: vec![RawSeries {
                selling_point_id: SellingPointId::from("bar"),
                lat: 46.52,
                lng: 6.57,
                cumulative,
            }],
        }
    }

    fn spawn_worker() -> (PlaybackHandle, watch::Sender<bool>, tokio::task::JoinHandle<()>, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let (handle, worker) = create_playback_worker(
            MarkerScale::default(),
            Duration::from_secs(1),
            metrics.clone(),
            8,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(shutdown_rx));
        (handle, shutdown_tx, task, metrics)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_advance_once_per_period() {
        let (handle, _shutdown, _task, _) = spawn_worker();
        handle.load(raw(vec![0, 100, 100, 250])).await.unwrap();
        assert!(handle.play().await.unwrap());

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(handle.snapshot().index, Some(1));

        sleep(Duration::from_millis(2000)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.index, Some(3));
        assert_eq!(snapshot.markers[0].cumulative, 250);

        sleep(Duration::from_millis(1000)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.index, Some(0));
        assert_eq!(snapshot.status, PlaybackStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_the_timer() {
        let (handle, _shutdown, _task, metrics) = spawn_worker();
        handle.load(raw(vec![0, 1, 2, 3])).await.unwrap();
        handle.play().await.unwrap();

        sleep(Duration::from_millis(1500)).await;
        assert!(handle.pause().await.unwrap());

        sleep(Duration::from_secs(10)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.index, Some(1));
        assert_eq!(snapshot.status, PlaybackStatus::Stopped);
        assert_eq!(metrics.ticks_total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_then_play_rearms_from_now() {
        let (handle, _shutdown, _task, _) = spawn_worker();
        handle.load(raw(vec![0, 1, 2, 3])).await.unwrap();
        handle.play().await.unwrap();
        sleep(Duration::from_millis(1500)).await;

        handle.pause().await.unwrap();
        handle.play().await.unwrap();

        // The tick scheduled for t=2000 belonged to the old epoch
        sleep(Duration::from_millis(600)).await;
        assert_eq!(handle.snapshot().index, Some(1));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.snapshot().index, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_while_playing_resets() {
        let (handle, _shutdown, _task, _) = spawn_worker();
        handle.load(raw(vec![0, 1, 2, 3])).await.unwrap();
        handle.play().await.unwrap();
        sleep(Duration::from_millis(2500)).await;

        handle.load(raw(vec![0, 5])).await.unwrap();
        sleep(Duration::from_secs(5)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, PlaybackStatus::Stopped);
        assert_eq!(snapshot.index, Some(0));
        assert_eq!(snapshot.len, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_load_keeps_playing() {
        let (handle, _shutdown, _task, _) = spawn_worker();
        handle.load(raw(vec![0, 1, 2, 3])).await.unwrap();
        handle.play().await.unwrap();

        let err = handle.load(raw(vec![0, 9, 3])).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Timeline(e) if e.is_integrity()));

        sleep(Duration::from_millis(1500)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.len, 4);
        assert_eq!(snapshot.index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_replies_and_publishes() {
        let (handle, _shutdown, _task, _) = spawn_worker();
        assert_eq!(handle.seek(0).await, Err(PlaybackError::NotLoaded));

        handle.load(raw(vec![0, 1, 2, 3])).await.unwrap();
        let mut rx = handle.subscribe();
        assert_eq!(handle.seek(2).await, Ok(2));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().index, Some(2));

        assert_eq!(handle.seek(4).await, Err(PlaybackError::OutOfRangeSeek { index: 4, len: 4 }));
        assert_eq!(handle.snapshot().index, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_worker() {
        let (handle, shutdown, task, _) = spawn_worker();
        handle.load(raw(vec![0, 1])).await.unwrap();
        handle.play().await.unwrap();

        shutdown.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(handle.play().await, Err(PlaybackError::WorkerStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_and_subscribe_skips_the_play_publish() {
        let (handle, _shutdown, _task, metrics) = spawn_worker();
        handle.load(raw(vec![0, 100, 100, 250])).await.unwrap();

        let (started, mut rx) = handle.play_and_subscribe().await.unwrap();
        assert!(started);
        assert_eq!(rx.borrow().index, Some(0));
        assert_eq!(rx.borrow().status, PlaybackStatus::Playing);

        let mut frames = Vec::new();
        for _ in 0..4 {
            rx.changed().await.unwrap();
            frames.push(rx.borrow_and_update().index);
        }
        assert_eq!(frames, vec![Some(1), Some(2), Some(3), Some(0)]);
        assert_eq!(metrics.ticks_total(), 4);
    }
}
