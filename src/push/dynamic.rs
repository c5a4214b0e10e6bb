// src/push/dynamic.rs
//! Activity-stream check: new-item detection with first-poll suppression.

use chrono::Utc;
use futures::future::join_all;
use metrics::counter;
use tracing::{debug, error, info, warn};

use super::task::{DeliveryTask, FeedKind};
use super::tracker::Observation;
use super::{PushEngine, PushSnapshot};
use crate::feed::types::{ActivityItem, DynamicKind};

impl PushEngine {
    /// Fetches every watched uid concurrently, then updates dedup state and builds
    /// tasks. A failed or empty fetch skips that uid only, leaving its state as is.
    pub(crate) async fn check_dynamic(&self, snapshot: &PushSnapshot) -> Vec<DeliveryTask> {
        let table = &snapshot.routes.dynamic;
        if table.is_empty() {
            return Vec::new();
        }

        let fetched = join_all(table.keys().map(|&uid| async move {
            let res = self
                .fetch(snapshot, self.feeds.fetch_activity(uid))
                .await;
            (uid, res)
        }))
        .await;

        let now = Utc::now();
        let mut tasks = Vec::new();
        let mut tracker = self.dynamic.lock().expect("dynamic tracker mutex poisoned");

        for (uid, res) in fetched {
            let items = match res {
                Ok(items) => items,
                Err(e) => {
                    error!(target: "push", uid, error = ?e, "fetch user dynamics failed");
                    counter!("push_fetch_errors_total", "kind" => FeedKind::Dynamic.as_str())
                        .increment(1);
                    continue;
                }
            };

            let ids: Vec<String> = items.iter().map(|it| it.id.clone()).collect();
            let fresh = match tracker.observe(&uid.to_string(), &ids, snapshot.bookkeeping_ttl, now)
            {
                Observation::Anomaly => {
                    warn!(target: "push", uid, "no dynamics returned; skipping this tick");
                    continue;
                }
                Observation::FirstSeen => {
                    info!(target: "push", uid, items = ids.len(), "dynamics registered");
                    continue;
                }
                Observation::New(fresh) => fresh,
            };
            if fresh.is_empty() {
                continue;
            }

            let Some(routes) = table.get(&uid) else {
                continue;
            };
            // Oldest first, so a burst reads in posting order.
            for item in new_items(&items, &fresh).into_iter().rev() {
                let Some(text) = self.formatter.activity(item) else {
                    debug!(target: "push", uid, id = %item.id, "dynamic not deliverable; skipped");
                    counter!("push_suppressed_total", "reason" => "formatter").increment(1);
                    continue;
                };
                let ids = item.dedup_ids();
                for route in routes {
                    if route.only_video && item.kind != DynamicKind::Video {
                        continue;
                    }
                    tasks.push(DeliveryTask {
                        kind: FeedKind::Dynamic,
                        group: route.group,
                        text: text.clone(),
                        at_all: route.at_all,
                        item_ids: ids.clone(),
                    });
                }
            }
        }
        tasks
    }
}

/// Items whose id is in `fresh`, in fetch order, each id once.
fn new_items<'a>(items: &'a [ActivityItem], fresh: &[String]) -> Vec<&'a ActivityItem> {
    let mut out: Vec<&ActivityItem> = Vec::new();
    for it in items {
        if fresh.contains(&it.id) && !out.iter().any(|o| o.id == it.id) {
            out.push(it);
        }
    }
    out
}
