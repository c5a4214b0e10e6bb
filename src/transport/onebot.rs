// src/transport/onebot.rs
//! OneBot v11 HTTP API client.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{InboundMessage, Transport};
use crate::config::OneBotConfig;
use crate::feed::types::{GroupId, MessageId};
use crate::format::cq;

#[derive(Clone)]
pub struct OneBotClient {
    api_base: String,
    access_token: Option<String>,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    wording: Option<String>,
}

impl OneBotClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: None,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(cfg: &OneBotConfig) -> Self {
        let mut c = Self::new(cfg.api_base.clone()).with_timeout(cfg.timeout_secs);
        c.access_token = cfg
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty());
        c
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn call(&self, action: &str, params: Value) -> Result<Value> {
        let url = format!("{}/{}", self.api_base, action);
        let mut req = self.client.post(&url).timeout(self.timeout).json(&params);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }

        let resp: ApiResponse = req
            .send()
            .await
            .with_context(|| format!("onebot {action} request"))?
            .error_for_status()
            .with_context(|| format!("onebot {action} non-2xx"))?
            .json()
            .await
            .with_context(|| format!("onebot {action} response body"))?;

        if resp.status == "failed" {
            return Err(anyhow!(
                "onebot {action} failed: retcode {} {}",
                resp.retcode,
                resp.wording.unwrap_or_default()
            ));
        }
        Ok(resp.data)
    }
}

fn message_id_of(data: &Value) -> Option<MessageId> {
    data.get("message_id").and_then(Value::as_i64)
}

#[async_trait::async_trait]
impl Transport for OneBotClient {
    async fn send_group_msg(
        &self,
        group: GroupId,
        text: &str,
        at_all: bool,
    ) -> Result<Option<MessageId>> {
        let message = if at_all {
            format!("{text}\n\n{}", cq::at_all())
        } else {
            text.to_string()
        };
        let data = self
            .call(
                "send_group_msg",
                json!({ "group_id": group, "message": message }),
            )
            .await?;
        Ok(message_id_of(&data))
    }

    async fn reply(
        &self,
        to: &InboundMessage,
        text: &str,
        quote: bool,
    ) -> Result<Option<MessageId>> {
        let message = if quote {
            format!("{}{text}", cq::reply(to.message_id))
        } else {
            text.to_string()
        };
        let data = match to.group_id {
            Some(group) => {
                self.call(
                    "send_group_msg",
                    json!({ "group_id": group, "message": message }),
                )
                .await?
            }
            None => {
                self.call(
                    "send_private_msg",
                    json!({ "user_id": to.user_id, "message": message }),
                )
                .await?
            }
        };
        Ok(message_id_of(&data))
    }

    async fn delete_msg(&self, id: MessageId) -> Result<()> {
        self.call("delete_msg", json!({ "message_id": id })).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = OneBotClient::new("http://127.0.0.1:5700/");
        assert_eq!(c.api_base, "http://127.0.0.1:5700");
    }

    #[test]
    fn empty_token_is_ignored() {
        let cfg = OneBotConfig {
            access_token: Some("  ".into()),
            ..Default::default()
        };
        assert!(OneBotClient::from_config(&cfg).access_token.is_none());
    }

    #[test]
    fn message_id_extraction() {
        assert_eq!(message_id_of(&json!({ "message_id": 77 })), Some(77));
        assert_eq!(message_id_of(&Value::Null), None);
    }
}
