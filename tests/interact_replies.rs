// tests/interact_replies.rs
//
// Link lookups answered in chat, with recall handling.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bili_push::config::BilibiliConfig;
use bili_push::format::cq;
use bili_push::interact::DirectReplier;
use bili_push::transport::InboundMessage;
use chrono::Utc;
use common::*;

fn setup() -> (Arc<MockLookup>, Arc<RecordingTransport>, Arc<DirectReplier>) {
    let lookup = MockLookup::new();
    lookup.add_video("170001", "BV1v");
    lookup.add_dynamic("555");
    let transport = RecordingTransport::new();
    let r = replier(lookup.clone(), transport.clone(), bili_push::shared_recent_ids());
    (lookup, transport, r)
}

#[tokio::test]
async fn same_link_twice_in_one_group_is_answered_once() {
    let (_lookup, transport, r) = setup();
    let link = "https://www.bilibili.com/video/av170001";

    assert!(r.handle_message(&group_msg(1, 10, link)).await.unwrap());
    assert!(!r.handle_message(&group_msg(2, 10, link)).await.unwrap());
    // bvid of the same video counts as the same item.
    assert!(!r
        .handle_message(&group_msg(4, 10, "https://www.bilibili.com/video/BV1v"))
        .await
        .unwrap());
    assert_eq!(transport.sent_to(10).len(), 1);

    // Another group is independent.
    assert!(r.handle_message(&group_msg(5, 11, link)).await.unwrap());
    assert_eq!(transport.sent_to(11).len(), 1);
}

#[tokio::test]
async fn private_chats_are_not_rate_limited() {
    let (_lookup, transport, r) = setup();
    let msg = |id| InboundMessage {
        message_id: id,
        group_id: None,
        user_id: 42,
        text: "https://t.bilibili.com/555".into(),
    };
    assert!(r.handle_message(&msg(1)).await.unwrap());
    assert!(r.handle_message(&msg(2)).await.unwrap());
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn short_links_and_share_cards_are_resolved() {
    let (lookup, transport, r) = setup();
    lookup.add_short_link("https://b23.tv/AbC", "https://www.bilibili.com/video/BV1v?share=1");

    assert!(r
        .handle_message(&group_msg(1, 10, "快看 b23.tv/AbC"))
        .await
        .unwrap());

    let card = r#"{"meta":{"news":{"jumpUrl":"https://t.bilibili.com/555?tab=2"}}}"#;
    let text = format!("[CQ:json,data={}]哔哩哔哩", cq::escape_param(card));
    assert!(r.handle_message(&group_msg(2, 10, &text)).await.unwrap());

    let sent = transport.sent_to(10);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text, "video av170001");
    assert_eq!(sent[1].text, "dynamic 555");
}

#[tokio::test]
async fn disabled_lookups_ignore_links_entirely() {
    let (lookup, transport, r) = setup();
    r.reload(&BilibiliConfig::default());

    let handled = r
        .handle_message(&group_msg(1, 10, "https://www.bilibili.com/video/av170001"))
        .await
        .unwrap();
    assert!(!handled);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn recalled_trigger_deletes_the_bound_reply() {
    let (_lookup, transport, r) = setup();
    r.handle_message(&group_msg(1, 10, "https://t.bilibili.com/555"))
        .await
        .unwrap();
    let reply_id = transport.sent_to(10)[0].id;

    r.handle_recall(1).await.unwrap();
    assert_eq!(transport.deleted(), vec![reply_id]);
    assert!(r.recall_watch().is_empty());

    // A second recall notice has nothing left to delete.
    r.handle_recall(1).await.unwrap();
    assert_eq!(transport.deleted().len(), 1);
}

#[tokio::test]
async fn trigger_recalled_while_replying_deletes_the_reply_at_once() {
    let (_lookup, transport, r) = setup();
    let watcher = r.clone();
    transport.on_next_reply(move || {
        watcher.recall_watch().on_recall(7, Utc::now());
    });

    assert!(r
        .handle_message(&group_msg(7, 10, "https://t.bilibili.com/555"))
        .await
        .unwrap());
    let reply_id = transport.sent_to(10)[0].id;
    assert_eq!(transport.deleted(), vec![reply_id]);
    assert!(r.recall_watch().is_empty());
}

#[tokio::test]
async fn trigger_recalled_during_lookup_gets_no_reply() {
    let (lookup, transport, r) = setup();
    let watcher = r.clone();
    lookup.on_next_lookup(move || {
        watcher.recall_watch().on_recall(3, Utc::now());
    });

    r.handle_message(&group_msg(3, 10, "https://t.bilibili.com/555"))
        .await
        .unwrap();
    assert!(transport.sent().is_empty());
    assert!(transport.deleted().is_empty());
    assert!(r.recall_watch().is_empty());

    // Nothing was claimed: the same link pasted again is answered.
    assert!(r
        .handle_message(&group_msg(4, 10, "https://t.bilibili.com/555"))
        .await
        .unwrap());
    assert_eq!(transport.sent_to(10).len(), 1);
}

#[tokio::test]
async fn failed_reply_does_not_block_the_next_paste() {
    let (_lookup, transport, r) = setup();
    transport.fail_group(10);
    assert!(r
        .handle_message(&group_msg(1, 10, "https://t.bilibili.com/555"))
        .await
        .is_err());
    assert!(r.recall_watch().is_empty());

    transport.recover_group(10);
    assert!(r
        .handle_message(&group_msg(2, 10, "https://t.bilibili.com/555"))
        .await
        .unwrap());
    assert_eq!(transport.sent_to(10).len(), 1);
}

#[tokio::test]
async fn reply_without_message_id_leaves_no_watch_entry() {
    let (_lookup, transport, r) = setup();
    *transport.returns_ids.lock().unwrap() = false;

    assert!(r
        .handle_message(&group_msg(1, 10, "https://t.bilibili.com/555"))
        .await
        .unwrap());
    assert!(r.recall_watch().is_empty());
    r.handle_recall(1).await.unwrap();
    assert!(transport.deleted().is_empty());
}

#[tokio::test]
async fn unknown_item_sends_nothing_and_releases_the_watch() {
    let (_lookup, transport, r) = setup();
    let handled = r
        .handle_message(&group_msg(1, 10, "https://t.bilibili.com/999"))
        .await
        .unwrap();
    assert!(!handled);
    assert!(transport.sent().is_empty());
    assert!(r.recall_watch().is_empty());
}
