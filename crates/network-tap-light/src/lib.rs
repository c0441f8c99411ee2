//! Lightweight network-activity tap for the automation engine.
//!
//! Offers window-level network summaries and cached snapshots per page, fed by `Network.*`
//! events off the CDP event bus. Kept deliberately dumb: it counts and buckets requests rather
//! than reconstructing full request/response bodies, since the automation loop only needs a
//! coarse "is the page still loading things" signal (consumed by the `network_idle` wait policy).

pub mod config;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use config::TapConfig;

/// Identifier representing a page for which the tap is collecting data.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Raw signals fed in from the CDP event stream; deliberately coarser than
/// the `Network.*` payloads themselves, since the tap only needs enough to
/// bucket a response and tell whether anything is still in flight.
#[derive(Clone, Copy, Debug)]
pub enum TapEvent {
    RequestWillBeSent,
    ResponseReceived { status: i64 },
    LoadingFinished,
    LoadingFailed,
}

/// Window-level summary payload published on the event bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub page: PageId,
    pub window_ms: u64,
    pub req: u64,
    pub res2xx: u64,
    pub res4xx: u64,
    pub res5xx: u64,
    pub inflight: u64,
    pub quiet: bool,
    pub since_last_activity_ms: u64,
}

/// Snapshot representing cumulative counters exposed via pull-based API.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub req: u64,
    pub res2xx: u64,
    pub res4xx: u64,
    pub res5xx: u64,
    pub inflight: u64,
    pub quiet: bool,
    pub window_ms: u64,
    pub since_last_activity_ms: u64,
}

/// Errors emitted by the tap surface.
#[derive(Clone, Debug, Error)]
pub enum TapError {
    #[error("page not enabled")]
    PageNotEnabled,
    #[error("channel closed")]
    ChannelClosed,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Broadcast channel for network summaries.
pub type SummaryBus = broadcast::Sender<NetworkSummary>;

struct PageState {
    snapshot: RwLock<NetworkSnapshot>,
    last_activity: RwLock<Instant>,
    last_published: RwLock<Instant>,
    req: AtomicU64,
    res2xx: AtomicU64,
    res4xx: AtomicU64,
    res5xx: AtomicU64,
    inflight: AtomicU64,
}

impl PageState {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            snapshot: RwLock::new(NetworkSnapshot::default()),
            last_activity: RwLock::new(now),
            last_published: RwLock::new(now),
            req: AtomicU64::new(0),
            res2xx: AtomicU64::new(0),
            res4xx: AtomicU64::new(0),
            res5xx: AtomicU64::new(0),
            inflight: AtomicU64::new(0),
        }
    }
}

/// Background task recomputing quiet/inflight state and publishing
/// throttled summaries. Returned by `spawn_maintenance`; callers drop it on
/// shutdown via `shutdown`, matching the adapter's own task teardown pattern.
pub struct MaintenanceHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        self.cancel.cancel();
        self.task.await
    }
}

/// Core tap object: tracks per-page request/response counters fed by `ingest`,
/// exposes them via a pull-based snapshot or a push-based summary bus.
pub struct NetworkTapLight {
    pub bus: SummaryBus,
    config: TapConfig,
    states: DashMap<PageId, Arc<PageState>>,
}

impl NetworkTapLight {
    pub fn new(buffer: usize) -> (Self, broadcast::Receiver<NetworkSummary>) {
        Self::with_config(TapConfig::default(), buffer)
    }

    pub fn with_config(config: TapConfig, buffer: usize) -> (Self, broadcast::Receiver<NetworkSummary>) {
        let (tx, rx) = broadcast::channel(buffer);
        (
            Self {
                bus: tx,
                config,
                states: DashMap::new(),
            },
            rx,
        )
    }

    pub async fn enable(&self, page: PageId) -> Result<(), TapError> {
        if self.states.contains_key(&page) {
            return Ok(());
        }
        self.states.insert(page, Arc::new(PageState::new()));
        Ok(())
    }

    pub async fn disable(&self, page: PageId) -> Result<(), TapError> {
        self.states
            .remove(&page)
            .map(|_| ())
            .ok_or(TapError::PageNotEnabled)
    }

    /// Folds a raw CDP signal into the page's running counters. Never
    /// publishes directly; `spawn_maintenance` owns the publish cadence so a
    /// burst of events doesn't flood the summary bus.
    pub async fn ingest(&self, page: PageId, event: TapEvent) -> Result<(), TapError> {
        let state = self
            .states
            .get(&page)
            .ok_or(TapError::PageNotEnabled)?
            .clone();

        match event {
            TapEvent::RequestWillBeSent => {
                state.req.fetch_add(1, Ordering::SeqCst);
                state.inflight.fetch_add(1, Ordering::SeqCst);
            }
            TapEvent::ResponseReceived { status } => {
                match status {
                    200..=299 => state.res2xx.fetch_add(1, Ordering::SeqCst),
                    400..=499 => state.res4xx.fetch_add(1, Ordering::SeqCst),
                    500..=599 => state.res5xx.fetch_add(1, Ordering::SeqCst),
                    _ => 0,
                };
            }
            TapEvent::LoadingFinished | TapEvent::LoadingFailed => {
                saturating_decrement(&state.inflight);
            }
        }

        *state.last_activity.write().await = Instant::now();
        Ok(())
    }

    pub async fn update_snapshot(&self, page: PageId, snapshot: NetworkSnapshot) -> Result<(), TapError> {
        let state = self
            .states
            .get(&page)
            .ok_or(TapError::PageNotEnabled)?
            .clone();
        let mut guard = state.snapshot.write().await;
        *guard = snapshot;
        Ok(())
    }

    pub fn publish_summary(&self, summary: NetworkSummary) {
        let _ = self.bus.send(summary);
    }

    pub async fn current_snapshot(&self, page: PageId) -> Option<NetworkSnapshot> {
        let state = self.states.get(&page)?;
        let guard = state.snapshot.read().await;
        Some(guard.clone())
    }

    /// Starts the periodic recompute-and-publish loop. Runs every
    /// `config.window_ms` until `shutdown` is called on the returned handle.
    pub fn spawn_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        let cancel = CancellationToken::new();
        let tap = Arc::clone(self);
        let child_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(tap.config.window_ms.max(1)));
            loop {
                tokio::select! {
                    _ = child_cancel.cancelled() => break,
                    _ = ticker.tick() => tap.tick().await,
                }
            }
        });
        MaintenanceHandle { cancel, task }
    }

    async fn tick(&self) {
        for entry in self.states.iter() {
            let page = *entry.key();
            let state = Arc::clone(entry.value());
            self.tick_page(page, &state).await;
        }
    }

    async fn tick_page(&self, page: PageId, state: &PageState) {
        let now = Instant::now();
        let since_last_activity = now.duration_since(*state.last_activity.read().await);
        let since_last_activity_ms = since_last_activity.as_millis() as u64;
        let inflight = state.inflight.load(Ordering::SeqCst);
        let quiet = inflight == 0 && since_last_activity_ms >= self.config.quiet_window_ms;

        let snapshot = NetworkSnapshot {
            req: state.req.load(Ordering::SeqCst),
            res2xx: state.res2xx.load(Ordering::SeqCst),
            res4xx: state.res4xx.load(Ordering::SeqCst),
            res5xx: state.res5xx.load(Ordering::SeqCst),
            inflight,
            quiet,
            window_ms: self.config.window_ms,
            since_last_activity_ms,
        };
        *state.snapshot.write().await = snapshot.clone();

        let mut last_published = state.last_published.write().await;
        if now.duration_since(*last_published).as_millis() as u64 >= self.config.min_publish_interval_ms {
            *last_published = now;
            drop(last_published);
            self.publish_summary(NetworkSummary {
                page,
                window_ms: snapshot.window_ms,
                req: snapshot.req,
                res2xx: snapshot.res2xx,
                res4xx: snapshot.res4xx,
                res5xx: snapshot.res5xx,
                inflight: snapshot.inflight,
                quiet: snapshot.quiet,
                since_last_activity_ms: snapshot.since_last_activity_ms,
            });
        }
    }
}

fn saturating_decrement(counter: &AtomicU64) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v.saturating_sub(1)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ingest_tracks_request_and_response_counts() {
        let (tap, _rx) = NetworkTapLight::new(16);
        let page = PageId::new();
        tap.enable(page).await.unwrap();

        tap.ingest(page, TapEvent::RequestWillBeSent).await.unwrap();
        tap.ingest(page, TapEvent::ResponseReceived { status: 200 }).await.unwrap();
        tap.ingest(page, TapEvent::LoadingFinished).await.unwrap();

        let tap = Arc::new(tap);
        tap.tick().await;
        let snapshot = tap.current_snapshot(page).await.unwrap();
        assert_eq!(snapshot.req, 1);
        assert_eq!(snapshot.res2xx, 1);
        assert_eq!(snapshot.inflight, 0);
    }

    #[tokio::test]
    async fn ingest_on_disabled_page_errors() {
        let (tap, _rx) = NetworkTapLight::new(16);
        let page = PageId::new();
        assert!(matches!(
            tap.ingest(page, TapEvent::RequestWillBeSent).await,
            Err(TapError::PageNotEnabled)
        ));
    }

    #[tokio::test]
    async fn maintenance_task_publishes_and_shuts_down_cleanly() {
        let (tap, mut rx) = NetworkTapLight::with_config(
            TapConfig {
                window_ms: 10,
                quiet_window_ms: 50,
                min_publish_interval_ms: 0,
            },
            16,
        );
        let page = PageId::new();
        tap.enable(page).await.unwrap();
        tap.ingest(page, TapEvent::RequestWillBeSent).await.unwrap();

        let tap = Arc::new(tap);
        let handle = tap.spawn_maintenance();

        let summary = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("summary published before timeout")
            .unwrap();
        assert_eq!(summary.page.0, page.0);

        handle.shutdown().await.unwrap();
    }
}
