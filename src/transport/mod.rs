// src/transport/mod.rs
pub mod onebot;

use anyhow::Result;

use crate::feed::types::{GroupId, MessageId};

/// A chat message that reached the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: MessageId,
    /// `None` for private chats.
    pub group_id: Option<GroupId>,
    pub user_id: i64,
    pub text: String,
}

/// Outgoing side of the chat protocol.
///
/// `Ok(None)` means the send was accepted but no message id came back.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send_group_msg(
        &self,
        group: GroupId,
        text: &str,
        at_all: bool,
    ) -> Result<Option<MessageId>>;

    async fn reply(
        &self,
        to: &InboundMessage,
        text: &str,
        quote: bool,
    ) -> Result<Option<MessageId>>;

    async fn delete_msg(&self, id: MessageId) -> Result<()>;
}
