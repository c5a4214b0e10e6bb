// src/push/mod.rs
//! Polling push engine: routing snapshot, per-feed dedup state, scheduler and
//! the serialized delivery queue.
//!
//! A tick fans out the three feed checks concurrently. Each check commits its
//! own dedup state during the fetch phase and returns delivery tasks; the tasks
//! are then sent one by one with a fixed pause in between.

pub mod cache;
pub mod dynamic;
pub mod live;
pub mod routing;
pub mod season;
pub mod task;
pub mod tracker;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::{BilibiliConfig, MIN_PUSH_INTERVAL_SECS};
use crate::feed::types::FeedAdapter;
use crate::format::Formatter;
use crate::metrics::Metrics;
use crate::transport::Transport;
use cache::RecentIds;
use routing::RoutingTables;
use task::{DeliveryReport, DeliveryTask, FeedKind};
use tracker::{LiveTracker, NewItemTracker};

/// Lower bound for seen/first-observation bookkeeping.
pub const MIN_BOOKKEEPING_TTL_SECS: u64 = 3600;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("push_ticks_total", "Push checks started.");
        describe_counter!(
            "push_fetch_errors_total",
            "Feed fetch failures, by feed kind."
        );
        describe_counter!("push_tasks_total", "Delivery tasks produced, by feed kind.");
        describe_counter!("push_sent_total", "Push messages accepted by the transport.");
        describe_counter!(
            "push_suppressed_total",
            "Deliveries skipped, by reason."
        );
        describe_counter!(
            "push_delivery_errors_total",
            "Push messages the transport rejected."
        );
        describe_gauge!("push_last_tick_ts", "Unix ts when the last push check ran.");
    });
}

/// Immutable view of the push configuration, taken once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PushSnapshot {
    pub routes: RoutingTables,
    pub interval: Duration,
    pub bookkeeping_ttl: Duration,
    pub fetch_timeout: Duration,
    pub dispatch_delay: Duration,
}

impl PushSnapshot {
    pub fn from_config(cfg: &BilibiliConfig) -> Self {
        let interval = Duration::from_secs(cfg.push_check_interval.max(MIN_PUSH_INTERVAL_SECS));
        Self {
            routes: RoutingTables::from_rules(&cfg.push),
            interval,
            bookkeeping_ttl: bookkeeping_ttl(interval),
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs.max(1)),
            dispatch_delay: Duration::from_millis(cfg.dispatch_delay_ms),
        }
    }

    /// Snapshot with explicit tables and the default timings.
    pub fn with_routes(routes: RoutingTables) -> Self {
        let interval = Duration::from_secs(MIN_PUSH_INTERVAL_SECS);
        Self {
            routes,
            interval,
            bookkeeping_ttl: bookkeeping_ttl(interval),
            fetch_timeout: Duration::from_secs(10),
            dispatch_delay: Duration::from_secs(1),
        }
    }
}

/// max(floor, 10 × interval): entries must outlive several poll cycles.
pub fn bookkeeping_ttl(interval: Duration) -> Duration {
    (interval * 10).max(Duration::from_secs(MIN_BOOKKEEPING_TTL_SECS))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dynamic_tasks: usize,
    pub live_tasks: usize,
    pub season_tasks: usize,
    pub delivery: DeliveryReport,
}

pub struct PushEngine {
    feeds: Arc<dyn FeedAdapter>,
    formatter: Arc<dyn Formatter>,
    transport: Arc<dyn Transport>,
    recent: Arc<RecentIds>,
    snapshot: RwLock<Arc<PushSnapshot>>,
    dynamic: Mutex<NewItemTracker>,
    season: Mutex<NewItemTracker>,
    live: Mutex<LiveTracker>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PushEngine {
    pub fn new(
        feeds: Arc<dyn FeedAdapter>,
        formatter: Arc<dyn Formatter>,
        transport: Arc<dyn Transport>,
        recent: Arc<RecentIds>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            feeds,
            formatter,
            transport,
            recent,
            snapshot: RwLock::new(Arc::new(PushSnapshot::with_routes(
                RoutingTables::default(),
            ))),
            dynamic: Mutex::new(NewItemTracker::new(true)),
            season: Mutex::new(NewItemTracker::new(false)),
            live: Mutex::new(LiveTracker::default()),
            timer: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> Arc<PushSnapshot> {
        self.snapshot
            .read()
            .expect("push snapshot lock poisoned")
            .clone()
    }

    /// Rebuild from config and restart the schedule. Safe to call at start-up and on
    /// every config change; must run inside a tokio runtime.
    pub fn reload(self: &Arc<Self>, cfg: &BilibiliConfig) {
        self.apply(PushSnapshot::from_config(cfg));
    }

    /// Swap in `snapshot` wholesale, prune stale live records, and (re)start or stop
    /// the timer. A tick already in flight finishes with the snapshot it started with.
    pub fn apply(self: &Arc<Self>, snapshot: PushSnapshot) {
        let snapshot = Arc::new(snapshot);
        {
            let mut live = self.live.lock().expect("live tracker mutex poisoned");
            live.watch(snapshot.routes.live.keys().copied());
        }
        *self.snapshot.write().expect("push snapshot lock poisoned") = snapshot.clone();
        Metrics::record_snapshot(&snapshot);

        let mut timer = self.timer.lock().expect("push timer mutex poisoned");
        if let Some(old) = timer.take() {
            old.abort();
        }
        if snapshot.routes.is_empty() {
            info!(target: "push", "no push targets; scheduler idle");
            return;
        }

        info!(
            target: "push",
            dynamic = snapshot.routes.dynamic.len(),
            live = snapshot.routes.live.len(),
            season = snapshot.routes.season.len(),
            interval_secs = snapshot.interval.as_secs(),
            "push scheduler started"
        );
        *timer = Some(spawn_timer(Arc::downgrade(self), snapshot.interval));
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .expect("push timer mutex poisoned")
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Cancel the standing timer. In-flight ticks are not cancelled.
    pub fn stop(&self) {
        if let Some(h) = self.timer.lock().expect("push timer mutex poisoned").take() {
            h.abort();
        }
    }

    /// One full tick against the current snapshot.
    pub async fn check_push(&self) -> TickReport {
        let snapshot = self.snapshot();
        self.check_with(&snapshot).await
    }

    pub async fn check_with(&self, snapshot: &PushSnapshot) -> TickReport {
        counter!("push_ticks_total").increment(1);
        gauge!("push_last_tick_ts").set(Utc::now().timestamp() as f64);

        let (dynamic, live, season) = self.collect_tasks(snapshot).await;
        let report = TickReport {
            dynamic_tasks: dynamic.len(),
            live_tasks: live.len(),
            season_tasks: season.len(),
            delivery: DeliveryReport::default(),
        };

        let tasks: Vec<DeliveryTask> = dynamic.into_iter().chain(live).chain(season).collect();
        let delivery = self.run_tasks(&tasks, snapshot.dispatch_delay).await;
        debug!(
            target: "push",
            tasks = tasks.len(),
            sent = delivery.sent,
            suppressed = delivery.suppressed,
            failed = delivery.failed,
            "push tick done"
        );
        TickReport { delivery, ..report }
    }

    /// Fetch phase: run the three feed checks concurrently. A failing kind is
    /// logged and contributes nothing; it never affects the other two.
    pub async fn collect_tasks(
        &self,
        snapshot: &PushSnapshot,
    ) -> (Vec<DeliveryTask>, Vec<DeliveryTask>, Vec<DeliveryTask>) {
        let (dynamic, live, season) = tokio::join!(
            self.check_dynamic(snapshot),
            self.check_live(snapshot),
            self.check_season(snapshot),
        );

        let live = live.unwrap_or_else(|e| {
            error!(target: "push", error = ?e, "live check failed");
            counter!("push_fetch_errors_total", "kind" => FeedKind::Live.as_str()).increment(1);
            Vec::new()
        });

        for (kind, n) in [
            (FeedKind::Dynamic, dynamic.len()),
            (FeedKind::Live, live.len()),
            (FeedKind::Season, season.len()),
        ] {
            counter!("push_tasks_total", "kind" => kind.as_str()).increment(n as u64);
        }
        (dynamic, live, season)
    }

    /// Delivery phase: strictly sequential, pausing `delay` between sends.
    /// A failed send is logged, its recent-reply claim dropped, and the queue moves on.
    pub async fn run_tasks(&self, tasks: &[DeliveryTask], delay: Duration) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut sent_before = false;

        for task in tasks {
            if !self.claim(task) {
                report.suppressed += 1;
                continue;
            }
            if sent_before && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            sent_before = true;

            match self
                .transport
                .send_group_msg(task.group, &task.text, task.at_all)
                .await
            {
                Ok(_) => {
                    counter!("push_sent_total", "kind" => task.kind.as_str()).increment(1);
                    report.sent += 1;
                }
                Err(e) => {
                    error!(
                        target: "push",
                        error = ?e,
                        group = task.group,
                        kind = %task.kind,
                        "push delivery failed"
                    );
                    counter!("push_delivery_errors_total", "kind" => task.kind.as_str())
                        .increment(1);
                    self.recent.release(task.group, &task.item_ids);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Claim the task's ids for its destination in the recent-reply cache.
    fn claim(&self, task: &DeliveryTask) -> bool {
        if task.item_ids.is_empty() || self.recent.claim(task.group, &task.item_ids, Utc::now()) {
            return true;
        }
        debug!(
            target: "push",
            group = task.group,
            ids = ?task.item_ids,
            "already answered recently; push suppressed"
        );
        counter!("push_suppressed_total", "reason" => "recent").increment(1);
        false
    }

    /// Await one adapter call under the snapshot's fetch timeout.
    async fn fetch<T, F>(&self, snapshot: &PushSnapshot, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(snapshot.fetch_timeout, fut)
            .await
            .context("fetch timed out")?
    }
}

fn spawn_timer(engine: Weak<PushEngine>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // First tick completes immediately: a reload takes effect right away.
            ticker.tick().await;
            let Some(engine) = engine.upgrade() else {
                break;
            };
            // Delivery may outlast the interval; the next tick does not wait for it.
            tokio::spawn(async move {
                engine.check_push().await;
            });
        }
    })
}
