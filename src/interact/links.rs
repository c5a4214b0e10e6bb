// src/interact/links.rs
//! Pull bilibili item ids out of chat text and QQ share cards.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::format::cq;

static RE_VIDEO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bilibili\.com/video/(?:av(\d+)|(bv[\da-z]+))").unwrap());
static RE_DYNAMIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:t\.bilibili\.com/(\d+)|m\.bilibili\.com/dynamic/(\d+))").unwrap()
});
static RE_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bilibili\.com/read/(?:cv|mobile/)(\d+)").unwrap());
static RE_LIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)live\.bilibili\.com/(\d+)").unwrap());
static RE_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"((b23|acg)\.tv|bili2233\.cn)/[0-9a-zA-Z]+").unwrap());
static RE_CQ_JSON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[CQ:json,data=([^\]]+)\]").unwrap());

/// Ids found in one message; at most one of each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkIds {
    pub aid: Option<String>,
    pub bvid: Option<String>,
    pub dynamic: Option<String>,
    pub article: Option<String>,
    pub live_room: Option<String>,
}

impl LinkIds {
    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// Every id present, for recent-reply checks.
    pub fn all(&self) -> Vec<String> {
        [
            &self.aid,
            &self.bvid,
            &self.dynamic,
            &self.article,
            &self.live_room,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

fn first_group(caps: &regex::Captures, groups: &[usize]) -> Option<String> {
    groups
        .iter()
        .find_map(|&i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

/// Ids from full-length links.
pub fn ids_from_link(text: &str) -> LinkIds {
    let mut ids = LinkIds::default();
    if let Some(c) = RE_VIDEO.captures(text) {
        ids.aid = first_group(&c, &[1]);
        ids.bvid = first_group(&c, &[2]);
    }
    if let Some(c) = RE_DYNAMIC.captures(text) {
        ids.dynamic = first_group(&c, &[1, 2]);
    }
    if let Some(c) = RE_ARTICLE.captures(text) {
        ids.article = first_group(&c, &[1]);
    }
    if let Some(c) = RE_LIVE.captures(text) {
        ids.live_room = first_group(&c, &[1]);
    }
    ids
}

/// `https://b23.tv/xxxx`-style link in `text`, if any.
pub fn short_link(text: &str) -> Option<String> {
    RE_SHORT.find(text).map(|m| format!("https://{}", m.as_str()))
}

/// Target URL of a QQ mini-app or structured share card about bilibili.
pub fn share_card_url(text: &str) -> Option<String> {
    if !text.contains("哔哩哔哩") {
        return None;
    }
    let raw = RE_CQ_JSON.captures(text)?.get(1)?.as_str();
    let data: Value = serde_json::from_str(&cq::unescape(raw)).ok()?;
    ["/meta/detail_1/qqdocurl", "/meta/news/jumpUrl"]
        .iter()
        .find_map(|p| data.pointer(p).and_then(Value::as_str))
        .map(str::to_string)
}
