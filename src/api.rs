use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::feed::types::{GroupId, MessageId};
use crate::interact::DirectReplier;
use crate::transport::InboundMessage;

#[derive(Clone)]
pub struct AppState {
    pub replier: Arc<DirectReplier>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/onebot/event", post(onebot_event))
        .with_state(state)
}

/// OneBot v11 event report. Only the fields we act on; everything is optional.
#[derive(Debug, Default, Deserialize)]
struct OneBotEvent {
    #[serde(default)]
    post_type: String,
    #[serde(default)]
    message_type: String,
    #[serde(default)]
    notice_type: String,
    #[serde(default)]
    message_id: Option<MessageId>,
    #[serde(default)]
    group_id: Option<GroupId>,
    #[serde(default)]
    user_id: i64,
    #[serde(default)]
    raw_message: Option<String>,
    #[serde(default)]
    message: Value,
}

impl OneBotEvent {
    fn inbound(&self) -> Option<InboundMessage> {
        let text = self
            .raw_message
            .clone()
            .or_else(|| self.message.as_str().map(str::to_string))?;
        Some(InboundMessage {
            message_id: self.message_id?,
            group_id: if self.message_type == "group" {
                self.group_id
            } else {
                None
            },
            user_id: self.user_id,
            text,
        })
    }
}

async fn onebot_event(State(state): State<AppState>, Json(body): Json<Value>) -> StatusCode {
    let ev: OneBotEvent = match serde_json::from_value(body) {
        Ok(ev) => ev,
        Err(e) => {
            debug!(target: "api", error = %e, "unrecognized event report");
            return StatusCode::NO_CONTENT;
        }
    };

    match (ev.post_type.as_str(), ev.notice_type.as_str()) {
        ("message", _) => {
            let Some(msg) = ev.inbound() else {
                return StatusCode::NO_CONTENT;
            };
            let replier = state.replier.clone();
            tokio::spawn(async move {
                if let Err(e) = replier.handle_message(&msg).await {
                    warn!(target: "api", msg = msg.message_id, error = ?e, "link reply failed");
                }
            });
        }
        ("notice", "group_recall" | "friend_recall") => {
            let Some(id) = ev.message_id else {
                return StatusCode::NO_CONTENT;
            };
            let replier = state.replier.clone();
            tokio::spawn(async move {
                if let Err(e) = replier.handle_recall(id).await {
                    warn!(target: "api", msg = id, error = ?e, "recall handling failed");
                }
            });
        }
        _ => {}
    }
    StatusCode::NO_CONTENT
}
