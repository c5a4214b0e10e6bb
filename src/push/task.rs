// src/push/task.rs
use std::fmt;

use crate::feed::types::GroupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Dynamic,
    Live,
    Season,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Dynamic => "dynamic",
            FeedKind::Live => "live",
            FeedKind::Season => "season",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message to one destination, produced by a feed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTask {
    pub kind: FeedKind,
    pub group: GroupId,
    pub text: String,
    pub at_all: bool,
    /// Ids claimed in the recent-reply cache at dispatch; empty = never suppressed.
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub suppressed: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn total(&self) -> usize {
        self.sent + self.suppressed + self.failed
    }
}
