// src/interact/mod.rs
//! Replies to bilibili links pasted in chat, sharing the recent-reply cache
//! with the push engine and honouring message recalls.

pub mod links;
pub mod recall;

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::BilibiliConfig;
use crate::feed::types::{ItemLookup, LookupReply, MessageId};
use crate::push::cache::RecentIds;
use crate::transport::{InboundMessage, Transport};
use links::LinkIds;
use recall::RecallWatch;

pub const RECENT_REPLY_TTL: Duration = Duration::from_secs(3 * 60);

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("interact_replies_total", "Link lookups answered.");
        describe_counter!(
            "interact_recalled_total",
            "Replies deleted because their trigger was recalled."
        );
    });
}

/// Which lookups are enabled, and whether recalls are followed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractSettings {
    pub video: bool,
    pub dynamic: bool,
    pub article: bool,
    pub live_room: bool,
    pub respond_recall: bool,
}

impl InteractSettings {
    pub fn from_config(cfg: &BilibiliConfig) -> Self {
        Self {
            video: cfg.get_video_info,
            dynamic: cfg.get_dynamic_info,
            article: cfg.get_article_info,
            live_room: cfg.get_live_room_info,
            respond_recall: cfg.respond_recall,
        }
    }

    fn any_lookup(&self) -> bool {
        self.video || self.dynamic || self.article || self.live_room
    }
}

pub struct DirectReplier {
    lookup: Arc<dyn ItemLookup>,
    transport: Arc<dyn Transport>,
    recent: Arc<RecentIds>,
    recall: RecallWatch,
    settings: RwLock<InteractSettings>,
}

impl DirectReplier {
    pub fn new(
        lookup: Arc<dyn ItemLookup>,
        transport: Arc<dyn Transport>,
        recent: Arc<RecentIds>,
        settings: InteractSettings,
    ) -> Self {
        ensure_metrics_described();
        Self {
            lookup,
            transport,
            recent,
            recall: RecallWatch::default(),
            settings: RwLock::new(settings),
        }
    }

    pub fn reload(&self, cfg: &BilibiliConfig) {
        *self.settings.write().expect("interact settings lock poisoned") =
            InteractSettings::from_config(cfg);
    }

    pub fn settings(&self) -> InteractSettings {
        *self.settings.read().expect("interact settings lock poisoned")
    }

    pub fn recall_watch(&self) -> &RecallWatch {
        &self.recall
    }

    /// Answer a message that carries a bilibili link. Returns true when a link was
    /// recognized and looked up (whether or not a reply went out).
    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<bool> {
        let settings = self.settings();
        if !settings.any_lookup() {
            return Ok(false);
        }

        let source = links::share_card_url(&msg.text).unwrap_or_else(|| msg.text.clone());
        let ids = self.extract_ids(&source).await;
        if ids.is_empty() {
            return Ok(false);
        }

        if let Some(group) = msg.group_id {
            if self.recent.contains_any(group, &ids.all(), Utc::now()) {
                debug!(target: "interact", group, ids = ?ids.all(), "answered recently; ignored");
                return Ok(false);
            }
        }

        if settings.respond_recall {
            self.recall.mark_pending(msg.message_id, Utc::now());
        }

        let reply = match self.look_up(&settings, &ids).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                self.recall.release(msg.message_id);
                return Ok(false);
            }
            Err(e) => {
                self.recall.release(msg.message_id);
                return Err(e);
            }
        };

        self.reply_result(msg, &settings, reply).await?;
        Ok(true)
    }

    /// The message `inbound` was recalled; delete our reply to it if there is one.
    pub async fn handle_recall(&self, inbound: MessageId) -> Result<()> {
        if !self.settings().respond_recall {
            return Ok(());
        }
        if let Some(outgoing) = self.recall.on_recall(inbound, Utc::now()) {
            counter!("interact_recalled_total").increment(1);
            self.transport.delete_msg(outgoing).await?;
        }
        Ok(())
    }

    async fn extract_ids(&self, text: &str) -> LinkIds {
        let ids = links::ids_from_link(text);
        if !ids.is_empty() {
            return ids;
        }
        let Some(short) = links::short_link(text) else {
            return ids;
        };
        match self.lookup.resolve_short_link(&short).await {
            Ok(Some(target)) => links::ids_from_link(&target),
            Ok(None) => LinkIds::default(),
            Err(e) => {
                warn!(target: "interact", link = %short, error = ?e, "short link resolve failed");
                LinkIds::default()
            }
        }
    }

    /// First enabled kind wins: video, dynamic, article, live room.
    async fn look_up(
        &self,
        settings: &InteractSettings,
        ids: &LinkIds,
    ) -> Result<Option<LookupReply>> {
        if settings.video && (ids.aid.is_some() || ids.bvid.is_some()) {
            return self
                .lookup
                .video(ids.aid.as_deref(), ids.bvid.as_deref())
                .await;
        }
        if settings.dynamic {
            if let Some(id) = &ids.dynamic {
                return self.lookup.dynamic(id).await;
            }
        }
        if settings.article {
            if let Some(id) = &ids.article {
                return self.lookup.article(id).await;
            }
        }
        if settings.live_room {
            if let Some(id) = &ids.live_room {
                return self.lookup.live_room(id).await;
            }
        }
        Ok(None)
    }

    async fn reply_result(
        &self,
        msg: &InboundMessage,
        settings: &InteractSettings,
        reply: LookupReply,
    ) -> Result<()> {
        let watching = settings.respond_recall;
        if watching && self.recall.is_withdrawn(msg.message_id, Utc::now()) {
            debug!(target: "interact", msg = msg.message_id, "trigger recalled before reply");
            return Ok(());
        }
        if let Some(group) = msg.group_id {
            if !self.recent.claim(group, &reply.ids, Utc::now()) {
                self.recall.release(msg.message_id);
                return Ok(());
            }
        }

        let sent = match self.transport.reply(msg, &reply.text, reply.quote).await {
            Ok(id) => id,
            Err(e) => {
                self.recall.release(msg.message_id);
                if let Some(group) = msg.group_id {
                    self.recent.release(group, &reply.ids);
                }
                error!(target: "interact", msg = msg.message_id, error = ?e, "reply failed");
                return Err(e);
            }
        };
        counter!("interact_replies_total").increment(1);

        let Some(outgoing) = sent else {
            self.recall.release(msg.message_id);
            return Ok(());
        };
        if watching && !self.recall.bind(msg.message_id, outgoing, Utc::now()) {
            debug!(target: "interact", msg = msg.message_id, "trigger recalled during reply");
            counter!("interact_recalled_total").increment(1);
            self.transport.delete_msg(outgoing).await?;
        }
        Ok(())
    }
}
