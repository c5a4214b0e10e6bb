// src/push/routing.rs
//! Expansion of raw push rules into three normalized routing tables.

use std::collections::BTreeMap;
use tracing::warn;

use crate::config::{DetailedRule, PushRule};
use crate::feed::types::{GroupId, SeasonKey, Uid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub group: GroupId,
    pub at_all: bool,
    /// Only video-type activity items (activity table only).
    pub only_video: bool,
}

impl Route {
    pub fn new(group: GroupId, at_all: bool) -> Self {
        Self {
            group,
            at_all,
            only_video: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTables {
    pub dynamic: BTreeMap<Uid, Vec<Route>>,
    pub live: BTreeMap<Uid, Vec<Route>>,
    pub season: BTreeMap<SeasonKey, Vec<Route>>,
}

impl RoutingTables {
    pub fn is_empty(&self) -> bool {
        self.dynamic.is_empty() && self.live.is_empty() && self.season.is_empty()
    }

    /// Build all three tables from the `push` config map. Keys with no resulting
    /// route are left out, so they are never polled.
    pub fn from_rules(push: &BTreeMap<String, Vec<PushRule>>) -> Self {
        let mut tables = Self::default();

        for (raw_uid, rules) in push {
            let Ok(uid) = raw_uid.trim().parse::<Uid>() else {
                warn!(target: "config", key = %raw_uid, "push key is not a uid; ignored");
                continue;
            };
            let mut dynamic = Vec::new();
            let mut live = Vec::new();

            for rule in rules {
                match rule {
                    PushRule::Group(gid) => {
                        add_route(&mut dynamic, Route::new(*gid, false));
                        add_route(&mut live, Route::new(*gid, false));
                    }
                    PushRule::Detailed(d) => {
                        expand_detailed(uid, d, &mut dynamic, &mut live, &mut tables.season)
                    }
                    PushRule::Unrecognized(_) => {
                        warn!(target: "config", uid, "unrecognized push rule; ignored");
                    }
                }
            }

            if !dynamic.is_empty() {
                tables.dynamic.insert(uid, dynamic);
            }
            if !live.is_empty() {
                tables.live.insert(uid, live);
            }
        }

        tables
    }
}

fn expand_detailed(
    uid: Uid,
    d: &DetailedRule,
    dynamic: &mut Vec<Route>,
    live: &mut Vec<Route>,
    season: &mut BTreeMap<SeasonKey, Vec<Route>>,
) {
    if d.dynamic {
        add_route(dynamic, Route::new(d.gid, d.dynamic_at_all));
    } else if d.video {
        add_route(
            dynamic,
            Route {
                group: d.gid,
                at_all: d.dynamic_at_all,
                only_video: true,
            },
        );
    }
    if d.live {
        add_route(live, Route::new(d.gid, d.live_at_all));
    }
    for &season_id in &d.seasons {
        let key = SeasonKey { uid, season_id };
        add_route(
            season.entry(key).or_default(),
            Route::new(d.gid, d.season_at_all),
        );
    }
}

/// Insert `route`, collapsing onto an existing route for the same group:
/// @all if either asked for it, video-only only if both did.
fn add_route(routes: &mut Vec<Route>, route: Route) {
    match routes.iter_mut().find(|r| r.group == route.group) {
        Some(existing) => {
            existing.at_all |= route.at_all;
            existing.only_video &= route.only_video;
        }
        None => routes.push(route),
    }
}
