// src/push/season.rs
//! Season release check. Same shape as the activity check, but every
//! (uid, season) key has its own bookkeeping and an empty season is a valid
//! first observation rather than an anomaly.

use chrono::Utc;
use futures::future::join_all;
use metrics::counter;
use tracing::{error, info};

use super::task::{DeliveryTask, FeedKind};
use super::tracker::Observation;
use super::{PushEngine, PushSnapshot};

impl PushEngine {
    pub(crate) async fn check_season(&self, snapshot: &PushSnapshot) -> Vec<DeliveryTask> {
        let table = &snapshot.routes.season;
        if table.is_empty() {
            return Vec::new();
        }

        let fetched = join_all(table.keys().map(|&key| async move {
            let res = self.fetch(snapshot, self.feeds.fetch_season(key)).await;
            (key, res)
        }))
        .await;

        let now = Utc::now();
        let mut tasks = Vec::new();
        let mut tracker = self.season.lock().expect("season tracker mutex poisoned");

        for (key, res) in fetched {
            let items = match res {
                Ok(items) => items,
                Err(e) => {
                    error!(target: "push", season = %key, error = ?e, "fetch season videos failed");
                    counter!("push_fetch_errors_total", "kind" => FeedKind::Season.as_str())
                        .increment(1);
                    continue;
                }
            };

            let ids: Vec<String> = items.iter().map(|it| it.id()).collect();
            let fresh = match tracker.observe(&key.to_string(), &ids, snapshot.bookkeeping_ttl, now) {
                Observation::FirstSeen => {
                    info!(target: "push", season = %key, items = ids.len(), "season registered");
                    continue;
                }
                Observation::Anomaly => continue,
                Observation::New(fresh) => fresh,
            };
            if fresh.is_empty() {
                continue;
            }
            let Some(routes) = table.get(&key) else {
                continue;
            };

            for item in items.iter().rev().filter(|it| fresh.contains(&it.id())) {
                let Some(text) = self.formatter.season(item) else {
                    counter!("push_suppressed_total", "reason" => "formatter").increment(1);
                    continue;
                };
                let ids = item.dedup_ids();
                tasks.extend(routes.iter().map(|route| DeliveryTask {
                    kind: FeedKind::Season,
                    group: route.group,
                    text: text.clone(),
                    at_all: route.at_all,
                    item_ids: ids.clone(),
                }));
            }
        }
        tasks
    }
}
