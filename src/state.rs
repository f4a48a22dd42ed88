use crate::aggregator::{Aggregator, DashboardView, ViewListener};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::pnl::Entity;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

// ── Messages OUT to dashboard clients ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "view_update")]
    ViewUpdate { view: Box<DashboardView> },

    #[serde(rename = "entity_updated")]
    EntityUpdated { entity: Entity },
}

// ── Performance Counters (lock-free) ──

#[derive(Default)]
pub struct PerfCounters {
    pub views_built: AtomicU64,
    pub fetches: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Publishes every built view to the watch snapshot and the WS stream.
pub struct ViewBroadcaster {
    snapshot_tx: watch::Sender<Option<DashboardView>>,
    ws_tx: broadcast::Sender<WsMessage>,
    counters: Arc<PerfCounters>,
}

impl ViewListener for ViewBroadcaster {
    fn on_view(&self, view: &DashboardView) {
        self.snapshot_tx.send_replace(Some(view.clone()));
        send_counted(&self.ws_tx, &self.counters, WsMessage::ViewUpdate {
            view: Box::new(view.clone()),
        });
    }
}

#[inline]
fn send_counted(tx: &broadcast::Sender<WsMessage>, counters: &PerfCounters, msg: WsMessage) {
    // No subscribers is not an error.
    if tx.send(msg).is_ok() {
        counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub aggregator: Aggregator,

    // Aggregator -> Dashboard: latest view (watch = single producer, multi consumer)
    pub snapshot_rx: watch::Receiver<Option<DashboardView>>,

    // Aggregator -> Dashboard: event stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    pub counters: Arc<PerfCounters>,
}

impl AppState {
    /// Wires the broadcaster into the aggregator before sharing it.
    pub fn new(config: AppConfig, db: DbPool, mut aggregator: Aggregator) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let counters = Arc::new(PerfCounters::new());

        aggregator.add_listener(Arc::new(ViewBroadcaster {
            snapshot_tx,
            ws_tx: ws_tx.clone(),
            counters: counters.clone(),
        }));

        Arc::new(Self {
            config,
            db,
            aggregator,
            snapshot_rx,
            ws_tx,
            counters,
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        send_counted(&self.ws_tx, &self.counters, msg);
    }

    /// Count a built view, published or not.
    pub fn record_view(&self, view: &DashboardView) {
        self.counters.views_built.fetch_add(1, Ordering::Relaxed);
        self.counters
            .fetches
            .fetch_add(view.requested as u64, Ordering::Relaxed);
        self.counters
            .fetch_failures
            .fetch_add(view.errors.len() as u64, Ordering::Relaxed);
    }
}
