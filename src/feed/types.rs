// src/feed/types.rs
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub type Uid = u64;
pub type GroupId = i64;
pub type MessageId = i64;

/// Release-tracking key: one season (collection) of one uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeasonKey {
    pub uid: Uid,
    pub season_id: u64,
}

impl fmt::Display for SeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.season_id)
    }
}

/// Activity ("dynamic") type discriminant as reported by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicKind {
    Forward,
    Picture,
    Text,
    Video,
    Article,
    Audio,
    Share,
    LiveRoom,
    LivePlay,
    Other(u32),
}

impl DynamicKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Forward,
            2 => Self::Picture,
            4 => Self::Text,
            8 => Self::Video,
            64 => Self::Article,
            256 => Self::Audio,
            2048 => Self::Share,
            4200 => Self::LiveRoom,
            4308 => Self::LivePlay,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Forward => 1,
            Self::Picture => 2,
            Self::Text => 4,
            Self::Video => 8,
            Self::Article => 64,
            Self::Audio => 256,
            Self::Share => 2048,
            Self::LiveRoom => 4200,
            Self::LivePlay => 4308,
            Self::Other(c) => c,
        }
    }
}

/// One activity-stream item. `card` is the decoded type-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityItem {
    pub id: String,
    pub kind: DynamicKind,
    pub author: String,
    pub bvid: Option<String>,
    pub card: Value,
    pub origin: Option<Box<ActivityItem>>,
    pub vote: Option<Value>,
}

impl ActivityItem {
    /// Identifiers under which this item can also be reached by a pasted link.
    pub fn dedup_ids(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        if self.kind == DynamicKind::Video {
            if let Some(aid) = self.card.get("aid").and_then(value_as_id) {
                ids.push(aid);
            }
            if let Some(bvid) = &self.bvid {
                ids.push(bvid.clone());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveStatus {
    Live,
    Offline,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    pub status: LiveStatus,
    pub name: String,
    pub title: String,
    pub cover: String,
    pub room_id: u64,
}

impl LiveSnapshot {
    pub fn url(&self) -> String {
        format!("https://live.bilibili.com/{}", self.room_id)
    }
}

/// One video in a tracked season.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonItem {
    pub aid: u64,
    pub bvid: String,
    pub title: String,
    pub cover: String,
    pub season_name: String,
}

impl SeasonItem {
    pub fn id(&self) -> String {
        self.bvid.clone()
    }

    pub fn dedup_ids(&self) -> Vec<String> {
        vec![self.aid.to_string(), self.bvid.clone()]
    }
}

/// Remote snapshots consumed by the push engine. Implementations must be side-effect free;
/// failures are `Err`, never an empty success.
#[async_trait::async_trait]
pub trait FeedAdapter: Send + Sync {
    async fn fetch_activity(&self, uid: Uid) -> Result<Vec<ActivityItem>>;
    async fn fetch_live_status(&self, uids: &[Uid]) -> Result<HashMap<Uid, LiveSnapshot>>;
    async fn fetch_season(&self, key: SeasonKey) -> Result<Vec<SeasonItem>>;
}

/// Rendered answer to a pasted link, plus the ids it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupReply {
    pub text: String,
    pub ids: Vec<String>,
    pub quote: bool,
}

/// Single-item lookups used by direct interaction.
#[async_trait::async_trait]
pub trait ItemLookup: Send + Sync {
    async fn video(&self, aid: Option<&str>, bvid: Option<&str>) -> Result<Option<LookupReply>>;
    async fn dynamic(&self, id: &str) -> Result<Option<LookupReply>>;
    async fn article(&self, id: &str) -> Result<Option<LookupReply>>;
    async fn live_room(&self, id: &str) -> Result<Option<LookupReply>>;
    /// Follow one redirect hop of a short link; `None` when it does not redirect.
    async fn resolve_short_link(&self, url: &str) -> Result<Option<String>>;
}

pub(crate) fn value_as_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
