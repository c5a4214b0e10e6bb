// src/format/dynamic.rs
//! Activity ("dynamic") rendering, one body builder per type code.

use chrono::{DateTime, Local};
use serde_json::Value;

use super::cq::{escape, img};
use super::text::{human_num, purge_link, purge_links_in_text};
use super::{num_at, str_at};
use crate::feed::types::{ActivityItem, DynamicKind};

/// Marker text of an automatic lottery-result forward.
pub const LOTTERY_RESULT_MARK: &str = "详情请点击互动抽奖查看";

pub fn dynamic_link(id: &str) -> String {
    format!("https://t.bilibili.com/{id}")
}

/// Render one activity item. `None` means "do not deliver" (push-only rules).
pub fn render_activity(item: &ActivityItem, for_push: bool) -> Option<String> {
    if for_push
        && item.kind == DynamicKind::Forward
        && str_at(&item.card, "/item/content").contains(LOTTERY_RESULT_MARK)
    {
        return None;
    }

    let mut lines = vec![
        dynamic_link(&item.id),
        format!("UP：{}", escape(&item.author)),
        String::new(),
    ];
    lines.extend(body_lines(item, for_push));
    Some(lines.join("\n").trim().to_string())
}

fn body_lines(item: &ActivityItem, for_push: bool) -> Vec<String> {
    let card = &item.card;
    match item.kind {
        DynamicKind::Forward => {
            let origin = item
                .origin
                .as_deref()
                .map(|o| render_activity(o, for_push).unwrap_or_else(|| dynamic_link(&o.id)))
                .unwrap_or_else(|| dynamic_link(&str_at(card, "/item/orig_dy_id_str")));
            vec![clean(&str_at(card, "/item/content")), String::new(), origin]
        }
        DynamicKind::Picture => {
            let mut lines = vec![clean(&str_at(card, "/item/description"))];
            if let Some(pics) = card.pointer("/item/pictures").and_then(Value::as_array) {
                lines.extend(
                    pics.iter()
                        .filter_map(|p| p.get("img_src").and_then(Value::as_str))
                        .map(img),
                );
            }
            lines
        }
        DynamicKind::Text => {
            let mut lines = vec![clean(&str_at(card, "/item/content"))];
            if let Some(vote) = &item.vote {
                lines.extend(vote_lines(vote));
            }
            lines
        }
        DynamicKind::Video => {
            let mut lines = Vec::new();
            let dynamic = str_at(card, "/dynamic");
            if !dynamic.trim().is_empty() {
                lines.push(clean(&dynamic));
                lines.push(String::new());
            }
            let bvid = item.bvid.clone().unwrap_or_else(|| str_at(card, "/bvid"));
            lines.extend([
                img(&str_at(card, "/pic")),
                format!("av{}", num_at(card, "/aid")),
                escape(str_at(card, "/title").trim()),
                format!("UP：{}", escape(&str_at(card, "/owner/name"))),
                format!(
                    "{}播放 {}弹幕",
                    human_num(num_at(card, "/stat/view")),
                    human_num(num_at(card, "/stat/danmaku"))
                ),
                format!("https://www.bilibili.com/video/{bvid}"),
            ]);
            lines
        }
        DynamicKind::Article => {
            let mut lines = Vec::new();
            if let Some(first) = card
                .pointer("/image_urls/0")
                .and_then(Value::as_str)
            {
                lines.push(img(first));
            }
            lines.extend([
                escape(str_at(card, "/title").trim()),
                escape(str_at(card, "/summary").trim()),
                format!("https://www.bilibili.com/read/cv{}", num_at(card, "/id")),
            ]);
            lines
        }
        DynamicKind::Audio => {
            let mut lines = Vec::new();
            let intro = str_at(card, "/intro");
            if !intro.trim().is_empty() {
                lines.push(clean(&intro));
                lines.push(String::new());
            }
            let id = num_at(card, "/id");
            lines.extend([
                img(&str_at(card, "/cover")),
                format!("au{id}"),
                escape(str_at(card, "/title").trim()),
                format!("歌手：{}", escape(&str_at(card, "/author"))),
                format!("分类：{}", str_at(card, "/typeInfo")),
                format!(
                    "{}播放 {}评论",
                    human_num(num_at(card, "/playCnt")),
                    human_num(num_at(card, "/replyCnt"))
                ),
                format!("https://www.bilibili.com/audio/au{id}"),
            ]);
            lines
        }
        DynamicKind::Share => vec![
            img(&str_at(card, "/sketch/cover_url")),
            escape(&str_at(card, "/sketch/title")),
            escape(&purge_link(&str_at(card, "/sketch/target_url"))),
        ],
        DynamicKind::LiveRoom => {
            let room = num_at(card, "/roomid");
            let short = num_at(card, "/short_id");
            let mut room_line = format!("房间号：{room}");
            if short > 0 {
                room_line.push_str(&format!("  短号：{short}"));
            }
            vec![
                img(&str_at(card, "/cover")),
                escape(&str_at(card, "/title")),
                room_line,
                area_line(
                    &str_at(card, "/area_v2_parent_name"),
                    &str_at(card, "/area_v2_name"),
                ),
                live_line(num_at(card, "/live_status"), num_at(card, "/online")),
                format!(
                    "https://live.bilibili.com/{}",
                    if short > 0 { short } else { room }
                ),
            ]
        }
        DynamicKind::LivePlay => {
            let info = card.get("live_play_info").cloned().unwrap_or(Value::Null);
            let room = num_at(&info, "/room_id");
            vec![
                img(&str_at(&info, "/cover")),
                escape(&str_at(&info, "/title")),
                format!("房间号：{room}"),
                area_line(
                    &str_at(&info, "/parent_area_name"),
                    &str_at(&info, "/area_name"),
                ),
                live_line(num_at(&info, "/live_status"), num_at(&info, "/online")),
                format!("https://live.bilibili.com/{room}"),
            ]
        }
        DynamicKind::Other(code) => vec![format!("未知的动态类型 type={code}")],
    }
}

fn vote_lines(vote: &Value) -> Vec<String> {
    let end = DateTime::from_timestamp(num_at(vote, "/endtime") as i64, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    let mut lines = vec![
        String::new(),
        format!("【投票】{}", str_at(vote, "/desc")),
        format!("截止日期：{end}"),
        format!("参与人数：{}", human_num(num_at(vote, "/join_num"))),
        String::new(),
        format!("投票选项（最多选择{}项）", num_at(vote, "/choice_cnt")),
    ];
    if let Some(options) = vote.get("options").and_then(Value::as_array) {
        for opt in options {
            lines.push(format!("- {}", str_at(opt, "/desc")));
            let url = str_at(opt, "/img_url");
            if !url.is_empty() {
                lines.push(img(&url));
            }
        }
    }
    lines
}

pub(crate) fn area_line(parent: &str, area: &str) -> String {
    if parent == area {
        format!("分区：{parent}")
    } else {
        format!("分区：{parent}-{area}")
    }
}

pub(crate) fn live_line(status: u64, online: u64) -> String {
    if status != 0 {
        format!("直播中  {}人气", human_num(online))
    } else {
        "未开播".to_string()
    }
}

fn clean(s: &str) -> String {
    escape(&purge_links_in_text(s.trim()))
}
