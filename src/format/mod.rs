// src/format/mod.rs
//! Item → message text. Everything here is a pure data transform.

pub mod cq;
pub mod dynamic;
pub mod text;

use serde_json::Value;

use crate::feed::types::{ActivityItem, LiveSnapshot, SeasonItem};
use cq::{escape, img};
use dynamic::{area_line, live_line};
use text::{human_num, purge_links_in_text};

/// Converts fetched items into destination-ready text. `None` = suppress.
pub trait Formatter: Send + Sync {
    fn activity(&self, item: &ActivityItem) -> Option<String>;
    fn live(&self, snap: &LiveSnapshot) -> Option<String>;
    fn season(&self, item: &SeasonItem) -> Option<String>;
}

/// Formatter producing OneBot CQ-code messages for push delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiliFormatter;

impl Formatter for BiliFormatter {
    fn activity(&self, item: &ActivityItem) -> Option<String> {
        dynamic::render_activity(item, true)
    }

    fn live(&self, snap: &LiveSnapshot) -> Option<String> {
        Some(render_live_start(snap))
    }

    fn season(&self, item: &SeasonItem) -> Option<String> {
        Some(render_season_video(item))
    }
}

pub fn render_live_start(snap: &LiveSnapshot) -> String {
    let mut lines = Vec::new();
    if !snap.cover.is_empty() {
        lines.push(img(&snap.cover));
    }
    lines.push(format!("【{}】{}", escape(&snap.name), escape(&snap.title)));
    lines.push(snap.url());
    lines.join("\n")
}

pub fn render_season_video(item: &SeasonItem) -> String {
    [
        img(&item.cover),
        format!("av{}", item.aid),
        escape(item.title.trim()),
        format!("合集：{}", escape(&item.season_name)),
        format!("https://www.bilibili.com/video/{}", item.bvid),
    ]
    .join("\n")
}

/// `x/web-interface/view` payload.
pub fn render_video_view(view: &Value) -> String {
    let mut lines = vec![
        img(&str_at(view, "/pic")),
        format!("av{}", num_at(view, "/aid")),
        escape(str_at(view, "/title").trim()),
        format!("UP：{}", escape(&str_at(view, "/owner/name"))),
        format!(
            "{}播放 {}弹幕",
            human_num(num_at(view, "/stat/view")),
            human_num(num_at(view, "/stat/danmaku"))
        ),
        format!("https://www.bilibili.com/video/{}", str_at(view, "/bvid")),
    ];
    let desc = str_at(view, "/desc");
    if !desc.trim().is_empty() && desc.trim() != "-" {
        lines.push(String::new());
        lines.push(escape(&purge_links_in_text(desc.trim())));
    }
    lines.join("\n")
}

/// `x/article/viewinfo` payload.
pub fn render_article_view(id: &str, info: &Value) -> String {
    let mut lines = Vec::new();
    if let Some(first) = info.pointer("/image_urls/0").and_then(Value::as_str) {
        lines.push(img(first));
    }
    lines.extend([
        escape(str_at(info, "/title").trim()),
        format!("UP：{}", escape(&str_at(info, "/author_name"))),
        format!("{}阅读", human_num(num_at(info, "/stats/view"))),
        format!("https://www.bilibili.com/read/cv{id}"),
    ]);
    lines.join("\n")
}

/// `room/v1/Room/get_info` payload.
pub fn render_live_room(info: &Value) -> String {
    let room = num_at(info, "/room_id");
    let short = num_at(info, "/short_id");
    let mut room_line = format!("房间号：{room}");
    if short > 0 {
        room_line.push_str(&format!("  短号：{short}"));
    }
    let cover = str_at(info, "/user_cover");
    let mut lines = Vec::new();
    if !cover.is_empty() {
        lines.push(img(&cover));
    }
    lines.extend([
        escape(&str_at(info, "/title")),
        room_line,
        area_line(
            &str_at(info, "/parent_area_name"),
            &str_at(info, "/area_name"),
        ),
        live_line(num_at(info, "/live_status"), num_at(info, "/online")),
        format!(
            "https://live.bilibili.com/{}",
            if short > 0 { short } else { room }
        ),
    ]);
    lines.join("\n")
}

/// String at a JSON pointer, empty when missing or not a string.
pub(crate) fn str_at(v: &Value, pointer: &str) -> String {
    v.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Unsigned number at a JSON pointer; numeric strings are accepted, anything else is 0.
pub(crate) fn num_at(v: &Value, pointer: &str) -> u64 {
    match v.pointer(pointer) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::LiveStatus;
    use serde_json::json;

    #[test]
    fn live_notice_layout() {
        let snap = LiveSnapshot {
            status: LiveStatus::Live,
            name: "主播".into(),
            title: "开播啦".into(),
            cover: "https://i0.hdslb.com/c.jpg".into(),
            room_id: 123,
        };
        assert_eq!(
            BiliFormatter.live(&snap).unwrap(),
            "[CQ:image,file=https://i0.hdslb.com/c.jpg]\n【主播】开播啦\nhttps://live.bilibili.com/123"
        );
    }

    #[test]
    fn num_at_accepts_numeric_strings() {
        let v = json!({ "a": "17", "b": 3, "c": "x" });
        assert_eq!(num_at(&v, "/a"), 17);
        assert_eq!(num_at(&v, "/b"), 3);
        assert_eq!(num_at(&v, "/c"), 0);
        assert_eq!(num_at(&v, "/missing"), 0);
    }
}
