// src/push/live.rs
//! Live-status check: edge-triggered on the transition into "live".

use anyhow::Result;
use tracing::{debug, info};

use super::task::{DeliveryTask, FeedKind};
use super::{PushEngine, PushSnapshot};
use crate::feed::types::{LiveStatus, Uid};

impl PushEngine {
    /// One batched status fetch for all watched uids. Fetch failure is returned to
    /// the caller and leaves every status record untouched.
    pub(crate) async fn check_live(&self, snapshot: &PushSnapshot) -> Result<Vec<DeliveryTask>> {
        let table = &snapshot.routes.live;
        if table.is_empty() {
            return Ok(Vec::new());
        }

        let uids: Vec<Uid> = table.keys().copied().collect();
        let statuses = self
            .fetch(snapshot, self.feeds.fetch_live_status(&uids))
            .await?;

        let mut tasks = Vec::new();
        let mut tracker = self.live.lock().expect("live tracker mutex poisoned");

        for (uid, routes) in table {
            let Some(snap) = statuses.get(uid) else {
                debug!(target: "push", uid, "no live status returned");
                continue;
            };
            if !tracker.transition(*uid, snap.status) {
                continue;
            }
            debug_assert_eq!(snap.status, LiveStatus::Live);
            info!(target: "push", uid, room = snap.room_id, "live started");

            let Some(text) = self.formatter.live(snap) else {
                continue;
            };
            tasks.extend(routes.iter().map(|route| DeliveryTask {
                kind: FeedKind::Live,
                group: route.group,
                text: text.clone(),
                at_all: route.at_all,
                item_ids: Vec::new(),
            }));
        }
        Ok(tasks)
    }
}
