// src/feed/bilibili.rs
//! bilibili web API adapter: activity stream, batched live status, season
//! archives, and single-item lookups for pasted links.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::types::{
    value_as_id, ActivityItem, DynamicKind, FeedAdapter, ItemLookup, LiveSnapshot, LiveStatus,
    LookupReply, SeasonItem, SeasonKey, Uid,
};
use crate::format::{self, dynamic};

const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const SPACE_HISTORY: &str =
    "https://api.vc.bilibili.com/dynamic_svr/v1/dynamic_svr/space_history";
const DYNAMIC_DETAIL: &str =
    "https://api.vc.bilibili.com/dynamic_svr/v1/dynamic_svr/get_dynamic_detail";
const LIVE_STATUS: &str = "https://api.live.bilibili.com/room/v1/Room/get_status_info_by_uids";
const LIVE_ROOM: &str = "https://api.live.bilibili.com/room/v1/Room/get_info";
const SEASON_ARCHIVES: &str = "https://api.bilibili.com/x/polymer/space/seasons_archives_list";
const VIDEO_VIEW: &str = "https://api.bilibili.com/x/web-interface/view";
const ARTICLE_VIEW: &str = "https://api.bilibili.com/x/article/viewinfo";

/// `{code, message, data}` wrapper shared by every endpoint used here.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default, alias = "msg")]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Clone)]
pub struct BiliClient {
    client: Client,
    no_redirect: Client,
    timeout: Duration,
}

impl BiliClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(UA)
            .build()
            .context("building bilibili http client")?;
        let no_redirect = Client::builder()
            .user_agent(UA)
            .redirect(redirect::Policy::none())
            .build()
            .context("building short-link http client")?;
        Ok(Self {
            client,
            no_redirect,
            timeout: Duration::from_secs(10),
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let env: Envelope = self
            .client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} non-2xx"))?
            .json()
            .await
            .with_context(|| format!("GET {url} body"))?;
        unwrap_envelope(url, env)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let env: Envelope = self
            .client
            .post(url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url} non-2xx"))?
            .json()
            .await
            .with_context(|| format!("POST {url} body"))?;
        unwrap_envelope(url, env)
    }
}

fn unwrap_envelope(url: &str, env: Envelope) -> Result<Value> {
    if env.code != 0 {
        return Err(anyhow!("{url} returned code {}: {}", env.code, env.message));
    }
    Ok(env.data)
}

/// Some payload fields are JSON documents serialized into a string.
fn embedded_json(v: Option<&Value>) -> Option<Value> {
    match v? {
        Value::String(s) if !s.is_empty() => serde_json::from_str(s).ok(),
        Value::Object(_) => v.cloned(),
        _ => None,
    }
}

fn typed<T: DeserializeOwned>(v: Value, what: &str) -> Result<T> {
    serde_json::from_value(v).with_context(|| format!("decoding {what}"))
}

/// One entry of `space_history.cards` (or `get_dynamic_detail.card`).
pub(crate) fn parse_card(raw: &Value) -> Result<ActivityItem> {
    let desc = raw.get("desc").context("card without desc")?;
    let id = desc
        .get("dynamic_id_str")
        .or_else(|| desc.get("dynamic_id"))
        .and_then(value_as_id)
        .context("card without dynamic id")?;
    let kind = DynamicKind::from_code(desc.get("type").and_then(Value::as_u64).unwrap_or(0) as u32);
    let card = embedded_json(raw.get("card")).unwrap_or(Value::Null);

    let author = desc
        .pointer("/user_profile/info/uname")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let vote = raw
        .pointer("/extension/vote")
        .and_then(|v| embedded_json(Some(v)));

    let origin = if kind == DynamicKind::Forward {
        parse_origin(desc, &card).map(Box::new)
    } else {
        None
    };

    Ok(ActivityItem {
        id,
        kind,
        author,
        bvid: desc
            .get("bvid")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        card,
        origin,
        vote,
    })
}

/// Forwarded item, reconstructed from `desc.origin` and the embedded origin card.
fn parse_origin(desc: &Value, card: &Value) -> Option<ActivityItem> {
    let odesc = desc.get("origin")?;
    let id = odesc.get("dynamic_id_str").and_then(value_as_id)?;
    let kind = DynamicKind::from_code(odesc.get("type").and_then(Value::as_u64).unwrap_or(0) as u32);
    let ocard = embedded_json(card.get("origin")).unwrap_or(Value::Null);
    let author = card
        .pointer("/origin_user/info/uname")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let vote = card
        .pointer("/origin_extension/vote")
        .and_then(|v| embedded_json(Some(v)));
    Some(ActivityItem {
        id,
        kind,
        author,
        bvid: odesc
            .get("bvid")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        card: ocard,
        origin: None,
        vote,
    })
}

#[derive(Debug, Deserialize)]
struct LiveRow {
    #[serde(default)]
    live_status: u8,
    #[serde(default)]
    uname: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    cover_from_user: String,
    #[serde(default)]
    room_id: u64,
}

/// `get_status_info_by_uids.data`: object keyed by uid; an empty result is `[]`.
pub(crate) fn parse_live_statuses(data: Value) -> Result<HashMap<Uid, LiveSnapshot>> {
    let map = match data {
        Value::Object(map) => map,
        Value::Array(a) if a.is_empty() => return Ok(HashMap::new()),
        Value::Null => return Ok(HashMap::new()),
        other => return Err(anyhow!("unexpected live status payload: {other}")),
    };
    let mut out = HashMap::with_capacity(map.len());
    for (uid, row) in map {
        let Ok(uid) = uid.parse::<Uid>() else {
            continue;
        };
        let row: LiveRow = typed(row, "live status row")?;
        out.insert(
            uid,
            LiveSnapshot {
                status: if row.live_status == 1 {
                    LiveStatus::Live
                } else {
                    LiveStatus::Offline
                },
                name: row.uname,
                title: row.title,
                cover: row.cover_from_user,
                room_id: row.room_id,
            },
        );
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct SeasonPage {
    #[serde(default)]
    archives: Vec<Archive>,
    #[serde(default)]
    meta: SeasonMeta,
}

#[derive(Debug, Default, Deserialize)]
struct SeasonMeta {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Archive {
    aid: u64,
    bvid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    pic: String,
}

/// Season archives, newest first.
pub(crate) fn parse_season(data: Value) -> Result<Vec<SeasonItem>> {
    let page: SeasonPage = typed(data, "season archives")?;
    let name = page.meta.name;
    Ok(page
        .archives
        .into_iter()
        .map(|a| SeasonItem {
            aid: a.aid,
            bvid: a.bvid,
            title: a.title,
            cover: a.pic,
            season_name: name.clone(),
        })
        .collect())
}

#[async_trait]
impl FeedAdapter for BiliClient {
    async fn fetch_activity(&self, uid: Uid) -> Result<Vec<ActivityItem>> {
        let data = self
            .get(
                SPACE_HISTORY,
                &[
                    ("host_uid", uid.to_string()),
                    ("offset_dynamic_id", "0".into()),
                    ("need_top", "0".into()),
                ],
            )
            .await?;
        let Some(cards) = data.get("cards").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        cards.iter().map(parse_card).collect()
    }

    async fn fetch_live_status(&self, uids: &[Uid]) -> Result<HashMap<Uid, LiveSnapshot>> {
        let data = self.post_json(LIVE_STATUS, &json!({ "uids": uids })).await?;
        parse_live_statuses(data)
    }

    async fn fetch_season(&self, key: SeasonKey) -> Result<Vec<SeasonItem>> {
        let data = self
            .get(
                SEASON_ARCHIVES,
                &[
                    ("mid", key.uid.to_string()),
                    ("season_id", key.season_id.to_string()),
                    ("sort_reverse", "false".into()),
                    ("page_num", "1".into()),
                    ("page_size", "30".into()),
                ],
            )
            .await?;
        parse_season(data)
    }
}

#[async_trait]
impl ItemLookup for BiliClient {
    async fn video(&self, aid: Option<&str>, bvid: Option<&str>) -> Result<Option<LookupReply>> {
        let query = match (aid, bvid) {
            (Some(aid), _) => ("aid", aid.to_string()),
            (None, Some(bvid)) => ("bvid", bvid.to_string()),
            (None, None) => return Ok(None),
        };
        let view = self.get(VIDEO_VIEW, &[query]).await?;
        let ids = [format::num_at(&view, "/aid").to_string(), format::str_at(&view, "/bvid")]
            .into_iter()
            .filter(|s| !s.is_empty() && s != "0")
            .collect();
        Ok(Some(LookupReply {
            text: format::render_video_view(&view),
            ids,
            quote: true,
        }))
    }

    async fn dynamic(&self, id: &str) -> Result<Option<LookupReply>> {
        let data = self
            .get(DYNAMIC_DETAIL, &[("dynamic_id", id.to_string())])
            .await?;
        let Some(raw) = data.get("card") else {
            debug!(target: "interact", id, "dynamic not found");
            return Ok(None);
        };
        let item = parse_card(raw)?;
        Ok(dynamic::render_activity(&item, false).map(|text| LookupReply {
            text,
            ids: item.dedup_ids(),
            quote: true,
        }))
    }

    async fn article(&self, id: &str) -> Result<Option<LookupReply>> {
        let info = self.get(ARTICLE_VIEW, &[("id", id.to_string())]).await?;
        Ok(Some(LookupReply {
            text: format::render_article_view(id, &info),
            ids: vec![id.to_string()],
            quote: true,
        }))
    }

    async fn live_room(&self, id: &str) -> Result<Option<LookupReply>> {
        let info = self.get(LIVE_ROOM, &[("room_id", id.to_string())]).await?;
        Ok(Some(LookupReply {
            text: format::render_live_room(&info),
            ids: vec![id.to_string()],
            quote: true,
        }))
    }

    async fn resolve_short_link(&self, url: &str) -> Result<Option<String>> {
        let resp = self
            .no_redirect
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("HEAD {url}"))?;
        if !resp.status().is_redirection() && resp.status() != StatusCode::OK {
            return Err(anyhow!("HEAD {url} returned {}", resp.status()));
        }
        Ok(resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}
