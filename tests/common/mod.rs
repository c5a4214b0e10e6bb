// tests/common/mod.rs
//
// In-memory feed adapter, transport and item lookup shared by the integration
// tests. Each mock records what it was asked so tests can assert on traffic.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use bili_push::config::{BilibiliConfig, DetailedRule, PushRule};
use bili_push::feed::types::{
    ActivityItem, DynamicKind, FeedAdapter, GroupId, ItemLookup, LiveSnapshot, LiveStatus,
    LookupReply, MessageId, SeasonItem, SeasonKey, Uid,
};
use bili_push::format::BiliFormatter;
use bili_push::interact::{DirectReplier, InteractSettings};
use bili_push::push::{PushEngine, PushSnapshot};
use bili_push::transport::{InboundMessage, Transport};

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

type Batch<T> = std::result::Result<T, String>;

#[derive(Default)]
pub struct MockFeeds {
    activity: Mutex<HashMap<Uid, Batch<Vec<ActivityItem>>>>,
    live: Mutex<Option<Batch<HashMap<Uid, LiveSnapshot>>>>,
    season: Mutex<HashMap<SeasonKey, Batch<Vec<SeasonItem>>>>,
    /// When set, the live fetch never answers.
    live_stalled: AtomicBool,
    pub activity_calls: AtomicUsize,
    pub live_calls: AtomicUsize,
    pub season_calls: AtomicUsize,
}

impl MockFeeds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_activity(&self, uid: Uid, items: Vec<ActivityItem>) {
        self.activity.lock().unwrap().insert(uid, Ok(items));
    }

    pub fn fail_activity(&self, uid: Uid) {
        self.activity
            .lock()
            .unwrap()
            .insert(uid, Err(format!("activity {uid} unavailable")));
    }

    pub fn set_live(&self, statuses: &[(Uid, LiveStatus)]) {
        let map = statuses
            .iter()
            .map(|&(uid, status)| (uid, live_snapshot(uid, status)))
            .collect();
        *self.live.lock().unwrap() = Some(Ok(map));
    }

    pub fn fail_live(&self) {
        *self.live.lock().unwrap() = Some(Err("live status unavailable".into()));
    }

    pub fn stall_live(&self, stalled: bool) {
        self.live_stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn set_season(&self, key: SeasonKey, items: Vec<SeasonItem>) {
        self.season.lock().unwrap().insert(key, Ok(items));
    }

    pub fn fail_season(&self, key: SeasonKey) {
        self.season
            .lock()
            .unwrap()
            .insert(key, Err(format!("season {key} unavailable")));
    }
}

#[async_trait]
impl FeedAdapter for MockFeeds {
    async fn fetch_activity(&self, uid: Uid) -> Result<Vec<ActivityItem>> {
        self.activity_calls.fetch_add(1, Ordering::SeqCst);
        match self.activity.lock().unwrap().get(&uid) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_live_status(&self, uids: &[Uid]) -> Result<HashMap<Uid, LiveSnapshot>> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        if self.live_stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        match &*self.live.lock().unwrap() {
            Some(Ok(map)) => Ok(map
                .iter()
                .filter(|(uid, _)| uids.contains(uid))
                .map(|(uid, s)| (*uid, s.clone()))
                .collect()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => Ok(HashMap::new()),
        }
    }

    async fn fetch_season(&self, key: SeasonKey) -> Result<Vec<SeasonItem>> {
        self.season_calls.fetch_add(1, Ordering::SeqCst);
        match self.season.lock().unwrap().get(&key) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub group: Option<GroupId>,
    pub text: String,
    pub at_all: bool,
    pub id: MessageId,
}

type Hook = Box<dyn FnOnce() + Send>;

pub struct RecordingTransport {
    pub sent: Mutex<Vec<Sent>>,
    pub deleted: Mutex<Vec<MessageId>>,
    failing_groups: Mutex<HashSet<GroupId>>,
    next_id: AtomicI64,
    /// When false, sends succeed but report no message id.
    pub returns_ids: Mutex<bool>,
    /// Runs once, right before the next reply is "sent".
    before_reply: Mutex<Option<Hook>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            failing_groups: Mutex::new(HashSet::new()),
            next_id: AtomicI64::new(1000),
            returns_ids: Mutex::new(true),
            before_reply: Mutex::new(None),
        }
    }
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_group(&self, group: GroupId) {
        self.failing_groups.lock().unwrap().insert(group);
    }

    pub fn recover_group(&self, group: GroupId) {
        self.failing_groups.lock().unwrap().remove(&group);
    }

    pub fn on_next_reply(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_reply.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, group: GroupId) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.group == Some(group))
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().unwrap().clone()
    }

    fn record(&self, group: Option<GroupId>, text: &str, at_all: bool) -> Result<Option<MessageId>> {
        if let Some(g) = group {
            if self.failing_groups.lock().unwrap().contains(&g) {
                return Err(anyhow!("group {g} rejected the message"));
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(Sent {
            group,
            text: text.to_string(),
            at_all,
            id,
        });
        Ok((*self.returns_ids.lock().unwrap()).then_some(id))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_group_msg(
        &self,
        group: GroupId,
        text: &str,
        at_all: bool,
    ) -> Result<Option<MessageId>> {
        self.record(Some(group), text, at_all)
    }

    async fn reply(
        &self,
        to: &InboundMessage,
        text: &str,
        _quote: bool,
    ) -> Result<Option<MessageId>> {
        let hook = self.before_reply.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.record(to.group_id, text, false)
    }

    async fn delete_msg(&self, id: MessageId) -> Result<()> {
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockLookup {
    pub videos: Mutex<HashMap<String, LookupReply>>,
    pub dynamics: Mutex<HashMap<String, LookupReply>>,
    pub short_links: Mutex<HashMap<String, String>>,
    pub calls: AtomicUsize,
    /// Runs once, while the next lookup is in progress.
    during_lookup: Mutex<Option<Hook>>,
}

impl MockLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a video reachable by both its aid and bvid.
    pub fn add_video(&self, aid: &str, bvid: &str) {
        let reply = LookupReply {
            text: format!("video av{aid}"),
            ids: vec![aid.to_string(), bvid.to_string()],
            quote: true,
        };
        let mut v = self.videos.lock().unwrap();
        v.insert(aid.to_string(), reply.clone());
        v.insert(bvid.to_string(), reply);
    }

    pub fn add_dynamic(&self, id: &str) {
        self.dynamics.lock().unwrap().insert(
            id.to_string(),
            LookupReply {
                text: format!("dynamic {id}"),
                ids: vec![id.to_string()],
                quote: true,
            },
        );
    }

    pub fn on_next_lookup(&self, hook: impl FnOnce() + Send + 'static) {
        *self.during_lookup.lock().unwrap() = Some(Box::new(hook));
    }

    fn lookup_started(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.during_lookup.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn add_short_link(&self, short: &str, target: &str) {
        self.short_links
            .lock()
            .unwrap()
            .insert(short.to_string(), target.to_string());
    }
}

#[async_trait]
impl ItemLookup for MockLookup {
    async fn video(&self, aid: Option<&str>, bvid: Option<&str>) -> Result<Option<LookupReply>> {
        self.lookup_started();
        let videos = self.videos.lock().unwrap();
        Ok(aid
            .and_then(|a| videos.get(a))
            .or_else(|| bvid.and_then(|b| videos.get(b)))
            .cloned())
    }

    async fn dynamic(&self, id: &str) -> Result<Option<LookupReply>> {
        self.lookup_started();
        Ok(self.dynamics.lock().unwrap().get(id).cloned())
    }

    async fn article(&self, _id: &str) -> Result<Option<LookupReply>> {
        self.lookup_started();
        Ok(None)
    }

    async fn live_room(&self, _id: &str) -> Result<Option<LookupReply>> {
        self.lookup_started();
        Ok(None)
    }

    async fn resolve_short_link(&self, url: &str) -> Result<Option<String>> {
        Ok(self.short_links.lock().unwrap().get(url).cloned())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn text_item(id: &str, content: &str) -> ActivityItem {
    ActivityItem {
        id: id.to_string(),
        kind: DynamicKind::Text,
        author: "测试UP".into(),
        bvid: None,
        card: json!({ "item": { "content": content } }),
        origin: None,
        vote: None,
    }
}

pub fn video_item(id: &str, aid: u64, bvid: &str) -> ActivityItem {
    ActivityItem {
        id: id.to_string(),
        kind: DynamicKind::Video,
        author: "测试UP".into(),
        bvid: Some(bvid.to_string()),
        card: json!({
            "aid": aid,
            "title": format!("视频{aid}"),
            "pic": "https://i0.hdslb.com/cover.jpg",
            "owner": { "name": "测试UP" },
            "stat": { "view": 12345, "danmaku": 6 }
        }),
        origin: None,
        vote: None,
    }
}

pub fn lottery_forward(id: &str) -> ActivityItem {
    ActivityItem {
        id: id.to_string(),
        kind: DynamicKind::Forward,
        author: "测试UP".into(),
        bvid: None,
        card: json!({ "item": { "content": "恭喜中奖 详情请点击互动抽奖查看" } }),
        origin: None,
        vote: None,
    }
}

pub fn live_snapshot(uid: Uid, status: LiveStatus) -> LiveSnapshot {
    LiveSnapshot {
        status,
        name: format!("主播{uid}"),
        title: "晚间直播".into(),
        cover: String::new(),
        room_id: 10_000 + uid,
    }
}

pub fn season_item(aid: u64) -> SeasonItem {
    SeasonItem {
        aid,
        bvid: format!("BV{aid}"),
        title: format!("第{aid}集"),
        cover: "https://i0.hdslb.com/s.jpg".into(),
        season_name: "合集".into(),
    }
}

pub fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn detailed(gid: GroupId) -> DetailedRule {
    DetailedRule {
        gid,
        ..Default::default()
    }
}

pub fn config_with(push: Vec<(Uid, Vec<PushRule>)>) -> BilibiliConfig {
    BilibiliConfig {
        push: push
            .into_iter()
            .map(|(uid, rules)| (uid.to_string(), rules))
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    }
}

/// Snapshot for `cfg` with no pacing between sends.
pub fn fast_snapshot(cfg: &BilibiliConfig) -> PushSnapshot {
    PushSnapshot {
        dispatch_delay: Duration::ZERO,
        ..PushSnapshot::from_config(cfg)
    }
}

pub fn engine(feeds: Arc<MockFeeds>, transport: Arc<RecordingTransport>) -> Arc<PushEngine> {
    engine_with_recent(feeds, transport, bili_push::shared_recent_ids())
}

pub fn engine_with_recent(
    feeds: Arc<MockFeeds>,
    transport: Arc<RecordingTransport>,
    recent: Arc<bili_push::push::cache::RecentIds>,
) -> Arc<PushEngine> {
    Arc::new(PushEngine::new(
        feeds,
        Arc::new(BiliFormatter),
        transport,
        recent,
    ))
}

pub fn all_lookups() -> InteractSettings {
    InteractSettings {
        video: true,
        dynamic: true,
        article: true,
        live_room: true,
        respond_recall: true,
    }
}

pub fn replier(
    lookup: Arc<MockLookup>,
    transport: Arc<RecordingTransport>,
    recent: Arc<bili_push::push::cache::RecentIds>,
) -> Arc<DirectReplier> {
    Arc::new(DirectReplier::new(lookup, transport, recent, all_lookups()))
}

pub fn group_msg(message_id: MessageId, group: GroupId, text: &str) -> InboundMessage {
    InboundMessage {
        message_id,
        group_id: Some(group),
        user_id: 42,
        text: text.to_string(),
    }
}
